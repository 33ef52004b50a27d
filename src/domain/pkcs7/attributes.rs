//! Signed (authenticated) attributes of the CMS `SignerInfo`.
//!
//! The same canonical attribute sequence is encoded twice: as a universal
//! `SET OF Attribute` (the bytes that are hashed and signed) and as the
//! `[0] IMPLICIT` field embedded in the `SignerInfo`. Both share one content
//! buffer so they can never diverge.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::{
    asn1::writer,
    constants::{
        ASN1_CONTEXT_0_CONSTRUCTED_TAG, ASN1_SET_TAG, OID_CONTENT_TYPE_COMPLETE, OID_DATA_COMPLETE,
        OID_MESSAGE_DIGEST_COMPLETE, OID_SIGNING_TIME_COMPLETE,
    },
    crypto::DocumentDigest,
};

#[derive(Clone, PartialEq, Eq)]
pub struct SignedAttribute {
    pub oid: String,  // e.g. "1.2.840.113549.1.9.3"
    pub der: Vec<u8>, // Complete Attribute SEQUENCE bytes
}

impl SignedAttribute {
    /// `Attribute ::= SEQUENCE { attrType OID, attrValues SET OF value }` with one value.
    #[must_use]
    pub fn new(oid: &str, oid_der: &[u8], value_der: &[u8]) -> Self {
        Self {
            oid: oid.to_string(),
            der: writer::sequence(&[oid_der, &writer::set_of(&[value_der])]),
        }
    }

    /// contentType = id-data
    #[must_use]
    pub fn content_type_data() -> Self {
        Self::new(
            "1.2.840.113549.1.9.3",
            OID_CONTENT_TYPE_COMPLETE,
            OID_DATA_COMPLETE,
        )
    }

    /// messageDigest = OCTET STRING of the document digest
    #[must_use]
    pub fn message_digest(digest: &DocumentDigest) -> Self {
        Self::new(
            "1.2.840.113549.1.9.4",
            OID_MESSAGE_DIGEST_COMPLETE,
            &writer::octet_string(digest.as_bytes()),
        )
    }

    /// signingTime = UTCTime (GeneralizedTime outside 1950..2049)
    #[must_use]
    pub fn signing_time(at: &DateTime<Utc>) -> Self {
        Self::new(
            "1.2.840.113549.1.9.5",
            OID_SIGNING_TIME_COMPLETE,
            &writer::time(at),
        )
    }
}

impl fmt::Debug for SignedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedAttribute(oid={}, len={})", self.oid, self.der.len())
    }
}

/// Canonically ordered signed attributes.
pub struct SignedAttributes {
    ordered: Vec<SignedAttribute>,
    concatenated_der: Vec<u8>, // concatenation of attribute DER sequences
}

impl SignedAttributes {
    #[must_use]
    pub fn new(mut attrs: Vec<SignedAttribute>) -> Self {
        attrs.sort_by(|a, b| a.der.cmp(&b.der)); // DER SET ordering
        let concatenated_der = attrs.iter().flat_map(|a| a.der.iter().copied()).collect();
        Self {
            ordered: attrs,
            concatenated_der,
        }
    }

    #[must_use]
    pub fn ordered(&self) -> &[SignedAttribute] {
        &self.ordered
    }

    /// Universal `SET OF Attribute`: the exact bytes that get hashed and signed.
    #[must_use]
    pub fn set_der(&self) -> Vec<u8> {
        writer::tlv(ASN1_SET_TAG, &self.concatenated_der)
    }

    /// `[0] IMPLICIT` form embedded in `SignerInfo.signedAttrs`.
    #[must_use]
    pub fn implicit_der(&self) -> Vec<u8> {
        writer::tlv(ASN1_CONTEXT_0_CONSTRUCTED_TAG, &self.concatenated_der)
    }

    /// SHA-256 of [`Self::set_der`], the value handed to the token.
    #[must_use]
    pub fn digest(&self) -> DocumentDigest {
        DocumentDigest::of(&self.set_der())
    }
}

impl fmt::Debug for SignedAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedAttributes(count={}, total_len={})",
            self.ordered.len(),
            self.concatenated_der.len()
        )
    }
}
