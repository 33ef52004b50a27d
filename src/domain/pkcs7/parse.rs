//! Structural CMS `SignedData` decoding for verification and inspection.
//!
//! Decodes exactly the shape produced by the builder (single `SignerInfo`,
//! `issuerAndSerialNumber` identifier, signed attributes present) and fails
//! with `EncodingError` on anything else.

use chrono::{DateTime, Utc};

use crate::{
    domain::{
        asn1::{self, reader, writer, DerElement},
        constants::{
            ASN1_CONTEXT_0_CONSTRUCTED_TAG, ASN1_OCTET_STRING_TAG, ASN1_SEQUENCE_TAG, ASN1_SET_TAG,
            OID_SIGNED_DATA_COMPLETE,
        },
    },
    SigningError, SigningResult,
};

/// One decoded signed attribute: OID plus the raw DER of its single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAttribute {
    pub oid: String,
    pub value_der: Vec<u8>,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ParsedSignerInfo {
    pub version: Vec<u8>,
    pub issuer_and_serial: Vec<u8>,
    pub digest_algorithm: Vec<u8>,
    /// `[0] IMPLICIT` signed attributes exactly as encoded.
    pub signed_attrs_implicit: Vec<u8>,
    pub signed_attrs: Vec<ParsedAttribute>,
    pub signature_algorithm: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ParsedSignedData {
    pub version: Vec<u8>,
    pub digest_algorithms: Vec<Vec<u8>>,
    /// Raw OID element of `encapContentInfo.eContentType`.
    pub encap_content_type: Vec<u8>,
    pub encap_content_present: bool,
    pub certificates: Vec<Vec<u8>>,
    pub signer: ParsedSignerInfo,
}

impl ParsedSignerInfo {
    /// Re-tag the embedded `[0]` attributes as universal `SET OF`: the bytes that were signed.
    #[must_use]
    pub fn signed_attrs_set_der(&self) -> Vec<u8> {
        let mut der = self.signed_attrs_implicit.clone();
        if let Some(tag) = der.first_mut() {
            *tag = ASN1_SET_TAG;
        }
        der
    }

    #[must_use]
    pub fn attribute(&self, oid: &str) -> Option<&ParsedAttribute> {
        self.signed_attrs.iter().find(|a| a.oid == oid)
    }

    /// messageDigest octets, if present and well formed.
    #[must_use]
    pub fn message_digest(&self) -> Option<Vec<u8>> {
        let attr = self.attribute("1.2.840.113549.1.9.4")?;
        let value = asn1::read_single(&attr.value_der).ok()?;
        (value.tag == ASN1_OCTET_STRING_TAG).then(|| value.content.to_vec())
    }

    #[must_use]
    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        let attr = self.attribute("1.2.840.113549.1.9.5")?;
        let value = asn1::read_single(&attr.value_der).ok()?;
        reader::parse_time(&value).ok()
    }

    /// Re-encode the decoded attributes as a canonical SET OF.
    #[must_use]
    pub fn reencode_signed_attrs(&self) -> Vec<u8> {
        let raws: Vec<&[u8]> = self.signed_attrs.iter().map(|a| a.raw.as_slice()).collect();
        writer::set_of(&raws)
    }
}

/// Parse a `ContentInfo` wrapping `SignedData`.
///
/// Trailing zero bytes after the outer element are accepted, as found when
/// the CMS is read back from a zero-padded `/Contents` placeholder.
pub fn parse_signed_data(der: &[u8]) -> SigningResult<ParsedSignedData> {
    let (content_info, rest) = asn1::read_element(der)?;
    if rest.iter().any(|b| *b != 0) {
        return Err(SigningError::EncodingError(
            "non-zero bytes after ContentInfo".into(),
        ));
    }
    content_info.expect_tag(ASN1_SEQUENCE_TAG, "ContentInfo")?;
    let ci = content_info.children()?;
    let [content_type, explicit] = two(&ci, "ContentInfo")?;
    if content_type.raw != OID_SIGNED_DATA_COMPLETE {
        return Err(SigningError::EncodingError(format!(
            "ContentInfo type is {}, not signedData",
            reader::oid_to_string(content_type)?
        )));
    }
    explicit.expect_tag(ASN1_CONTEXT_0_CONSTRUCTED_TAG, "ContentInfo content")?;
    let signed_data = asn1::read_single(explicit.content)?;
    signed_data.expect_tag(ASN1_SEQUENCE_TAG, "SignedData")?;

    let fields = signed_data.children()?;
    let mut it = fields.iter();
    let version = next(&mut it, "SignedData.version")?;
    let digest_algorithms = next(&mut it, "SignedData.digestAlgorithms")?;
    digest_algorithms.expect_tag(ASN1_SET_TAG, "digestAlgorithms")?;
    let encap = next(&mut it, "SignedData.encapContentInfo")?;
    encap.expect_tag(ASN1_SEQUENCE_TAG, "encapContentInfo")?;
    let encap_fields = encap.children()?;
    let encap_type = encap_fields
        .first()
        .ok_or_else(|| SigningError::EncodingError("empty encapContentInfo".into()))?;

    let mut certificates = Vec::new();
    let mut field = next(&mut it, "SignedData.signerInfos")?;
    if field.tag == ASN1_CONTEXT_0_CONSTRUCTED_TAG {
        certificates = field.children()?.iter().map(|c| c.raw.to_vec()).collect();
        field = next(&mut it, "SignedData.signerInfos")?;
    }
    // [1] crls are never produced here
    field.expect_tag(ASN1_SET_TAG, "signerInfos")?;
    let signer_infos = field.children()?;
    if signer_infos.len() != 1 {
        return Err(SigningError::EncodingError(format!(
            "expected exactly one SignerInfo, found {}",
            signer_infos.len()
        )));
    }

    Ok(ParsedSignedData {
        version: version.raw.to_vec(),
        digest_algorithms: digest_algorithms
            .children()?
            .iter()
            .map(|a| a.raw.to_vec())
            .collect(),
        encap_content_type: encap_type.raw.to_vec(),
        encap_content_present: encap_fields.len() > 1,
        certificates,
        signer: parse_signer_info(&signer_infos[0])?,
    })
}

fn parse_signer_info(element: &DerElement<'_>) -> SigningResult<ParsedSignerInfo> {
    element.expect_tag(ASN1_SEQUENCE_TAG, "SignerInfo")?;
    let fields = element.children()?;
    let mut it = fields.iter();
    let version = next(&mut it, "SignerInfo.version")?;
    let sid = next(&mut it, "SignerInfo.sid")?;
    sid.expect_tag(ASN1_SEQUENCE_TAG, "issuerAndSerialNumber")?;
    let digest_algorithm = next(&mut it, "SignerInfo.digestAlgorithm")?;
    let signed_attrs = next(&mut it, "SignerInfo.signedAttrs")?;
    signed_attrs.expect_tag(ASN1_CONTEXT_0_CONSTRUCTED_TAG, "signedAttrs")?;
    let signature_algorithm = next(&mut it, "SignerInfo.signatureAlgorithm")?;
    let signature = next(&mut it, "SignerInfo.signature")?;
    signature.expect_tag(ASN1_OCTET_STRING_TAG, "signature")?;

    let mut attrs = Vec::new();
    for attr in signed_attrs.children()? {
        attr.expect_tag(ASN1_SEQUENCE_TAG, "Attribute")?;
        let parts = attr.children()?;
        let [oid, values] = two(&parts, "Attribute")?;
        values.expect_tag(ASN1_SET_TAG, "Attribute values")?;
        let value = asn1::read_single(values.content)?;
        attrs.push(ParsedAttribute {
            oid: reader::oid_to_string(oid)?,
            value_der: value.raw.to_vec(),
            raw: attr.raw.to_vec(),
        });
    }

    Ok(ParsedSignerInfo {
        version: version.raw.to_vec(),
        issuer_and_serial: sid.raw.to_vec(),
        digest_algorithm: digest_algorithm.raw.to_vec(),
        signed_attrs_implicit: signed_attrs.raw.to_vec(),
        signed_attrs: attrs,
        signature_algorithm: signature_algorithm.raw.to_vec(),
        signature: signature.content.to_vec(),
    })
}

fn next<'a, 'b>(
    it: &mut std::slice::Iter<'b, DerElement<'a>>,
    what: &str,
) -> SigningResult<&'b DerElement<'a>> {
    it.next()
        .ok_or_else(|| SigningError::EncodingError(format!("missing {what}")))
}

fn two<'b, 'a>(elements: &'b [DerElement<'a>], what: &str) -> SigningResult<[&'b DerElement<'a>; 2]> {
    match elements {
        [a, b] => Ok([a, b]),
        _ => Err(SigningError::EncodingError(format!(
            "{what}: expected 2 fields, found {}",
            elements.len()
        ))),
    }
}
