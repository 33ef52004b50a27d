//! CMS `SignedData` builder for detached PDF signatures (`adbe.pkcs7.detached`).
//!
//! Assembles the final `ContentInfo` bottom-up with the DER writer so every
//! length field is computed from the bytes it prefixes:
//!
//! ```text
//! ContentInfo ::= SEQUENCE { signedData OID, [0] EXPLICIT SignedData }
//! SignedData  ::= SEQUENCE { version 1, digestAlgorithms SET { sha256 },
//!                            encapContentInfo { data } (detached),
//!                            certificates [0] IMPLICIT, signerInfos SET { SignerInfo } }
//! SignerInfo  ::= SEQUENCE { version 1, issuerAndSerialNumber, sha256,
//!                            signedAttrs [0] IMPLICIT, sha256WithRSAEncryption,
//!                            signature OCTET STRING }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    adapters::clock::Clock,
    domain::{
        asn1::writer,
        constants::{
            CMS_VERSION_1, OID_DATA_COMPLETE, OID_SIGNED_DATA_COMPLETE,
            SHA256_ALGORITHM_IDENTIFIER, SHA256_WITH_RSA_ALGORITHM_IDENTIFIER,
        },
        crypto::{DocumentDigest, RawSignature, SigningCertificate},
        pkcs7::{CmsSignedData, SignedAttributes},
    },
    services::signed_attributes_builder::SignedAttributesBuilder,
    SigningError, SigningResult,
};

pub struct CmsSignedDataBuilder {
    clock: Arc<dyn Clock>,
    additional_certs: Vec<Vec<u8>>,
}

impl CmsSignedDataBuilder {
    /// Create a builder whose signingTime comes from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            additional_certs: Vec::new(),
        }
    }

    /// Set additional certificates to include in the signature.
    ///
    /// These certificates (typically intermediate CAs read from the token)
    /// are embedded after the signing certificate so a validator can build
    /// the chain without fetching intermediates.
    #[must_use]
    pub fn with_additional_certs(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.additional_certs = certs;
        self
    }

    /// Build a detached `SignedData` over `document_digest`.
    ///
    /// `sign_fn` receives SHA-256 of `DER(SignedAttributes)` and must return
    /// the raw RSA PKCS#1 v1.5 signature over it.
    ///
    /// # Errors
    /// * `EncodingError` if `certificate_der` is not an RSA X.509 certificate
    /// * `SignatureSizeMismatch` if the signature length differs from the modulus size
    /// * whatever `sign_fn` returns
    pub fn build<F>(
        &self,
        document_digest: &DocumentDigest,
        certificate_der: &[u8],
        sign_fn: F,
    ) -> SigningResult<CmsSignedData>
    where
        F: FnOnce(&DocumentDigest) -> SigningResult<RawSignature>,
    {
        self.build_at(document_digest, certificate_der, &self.clock.now(), sign_fn)
    }

    /// Same as [`Self::build`] with an explicit signingTime.
    pub fn build_at<F>(
        &self,
        document_digest: &DocumentDigest,
        certificate_der: &[u8],
        signing_time: &DateTime<Utc>,
        sign_fn: F,
    ) -> SigningResult<CmsSignedData>
    where
        F: FnOnce(&DocumentDigest) -> SigningResult<RawSignature>,
    {
        let certificate = SigningCertificate::from_der(certificate_der.to_vec())?;

        // 1-2. Signed attributes and their digest
        let attrs = SignedAttributesBuilder::new().build(document_digest, signing_time);
        let attrs_digest = attrs.digest();
        log::debug!(
            "Signed attributes: {} bytes, digest {}",
            attrs.set_der().len(),
            attrs_digest.to_hex()
        );

        // 3. Sign DER(signedAttrs), never the document digest itself
        let signature = sign_fn(&attrs_digest)?;
        let expected = certificate.rsa_modulus_len();
        if signature.len() != expected {
            return Err(SigningError::SignatureSizeMismatch {
                expected,
                actual: signature.len(),
            });
        }

        // 4-6. SignerInfo, SignedData, ContentInfo
        let signer_infos = writer::set_of(&[&self.build_signer_info(&certificate, &attrs, &signature)]);
        let signed_data = writer::sequence(&[
            CMS_VERSION_1,
            &self.build_digest_algorithms_component(),
            &self.build_encap_content_info(),
            &self.build_certificates_component(&certificate),
            &signer_infos,
        ]);
        let content_info = writer::sequence(&[
            OID_SIGNED_DATA_COMPLETE,
            &writer::context_constructed(0, &signed_data),
        ]);

        log::info!(
            "Built CMS SignedData: {} bytes, signer '{}'",
            content_info.len(),
            certificate.subject()
        );
        Ok(CmsSignedData::from_der(content_info))
    }

    /// digestAlgorithms: SET OF { sha256 }
    #[must_use]
    pub fn build_digest_algorithms_component(&self) -> Vec<u8> {
        writer::set_of(&[SHA256_ALGORITHM_IDENTIFIER])
    }

    /// encapContentInfo: type data, eContent absent (detached)
    #[must_use]
    pub fn build_encap_content_info(&self) -> Vec<u8> {
        writer::sequence(&[OID_DATA_COMPLETE])
    }

    /// certificates [0] IMPLICIT: signing certificate first, then additional certs.
    #[must_use]
    pub fn build_certificates_component(&self, certificate: &SigningCertificate) -> Vec<u8> {
        let mut content = certificate.as_der().to_vec();
        for cert in &self.additional_certs {
            content.extend_from_slice(cert);
        }
        writer::context_constructed(0, &content)
    }

    /// Single `SignerInfo` with `[0] IMPLICIT` signed attributes.
    #[must_use]
    pub fn build_signer_info(
        &self,
        certificate: &SigningCertificate,
        attrs: &SignedAttributes,
        signature: &RawSignature,
    ) -> Vec<u8> {
        writer::sequence(&[
            CMS_VERSION_1,
            &certificate.issuer_and_serial_number(),
            SHA256_ALGORITHM_IDENTIFIER,
            &attrs.implicit_der(),
            SHA256_WITH_RSA_ALGORITHM_IDENTIFIER,
            &writer::octet_string(signature.as_slice()),
        ])
    }
}
