//! Service for constructing and canonicalizing signed attributes.

use chrono::{DateTime, Utc};

use crate::domain::{
    crypto::DocumentDigest,
    pkcs7::{SignedAttribute, SignedAttributes},
};

pub struct SignedAttributesBuilder; // stateless

impl Default for SignedAttributesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SignedAttributesBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// contentType = data, messageDigest = `document_digest`, signingTime = `signing_time`,
    /// in DER SET order.
    #[must_use]
    pub fn build(
        &self,
        document_digest: &DocumentDigest,
        signing_time: &DateTime<Utc>,
    ) -> SignedAttributes {
        self.canonicalize(vec![
            SignedAttribute::content_type_data(),
            SignedAttribute::message_digest(document_digest),
            SignedAttribute::signing_time(signing_time),
        ])
    }

    /// Build canonical attributes given already assembled Attribute SEQUENCE DER blobs.
    #[must_use]
    pub fn canonicalize(&self, raw_attributes: Vec<SignedAttribute>) -> SignedAttributes {
        SignedAttributes::new(raw_attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_three_attributes_in_set_order() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let attrs = SignedAttributesBuilder::new().build(&DocumentDigest::of(b"pdf"), &at);
        let oids: Vec<&str> = attrs.ordered().iter().map(|a| a.oid.as_str()).collect();
        assert_eq!(
            oids,
            vec![
                "1.2.840.113549.1.9.3",
                "1.2.840.113549.1.9.5",
                "1.2.840.113549.1.9.4"
            ]
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let digest = DocumentDigest::of(b"pdf");
        let builder = SignedAttributesBuilder::new();
        let a = builder.build(&digest, &at);
        let b = builder.canonicalize(vec![
            SignedAttribute::signing_time(&at),
            SignedAttribute::content_type_data(),
            SignedAttribute::message_digest(&digest),
        ]);
        assert_eq!(a.set_der(), b.set_der());
        assert_eq!(a.digest(), b.digest());
    }
}
