use std::fmt;

use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::{
    domain::{
        asn1::{self, writer},
        constants::{ASN1_INTEGER_TAG, ASN1_SEQUENCE_TAG, RSA_ENCRYPTION_OID},
    },
    SigningError, SigningResult,
};

/// Parsed signing certificate.
///
/// Keeps the original DER (embedded verbatim in `SignedData.certificates`)
/// next to the fields the CMS builder and the reports need.
#[derive(Clone)]
pub struct SigningCertificate {
    der: Box<[u8]>,
    issuer_der: Vec<u8>,
    serial_der: Vec<u8>,
    subject: String,
    issuer: String,
    serial_hex: String,
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
    modulus_len: usize,
}

impl SigningCertificate {
    /// Parse an X.509 certificate holding an RSA public key.
    ///
    /// # Errors
    /// `EncodingError` when the bytes are not a DER certificate or the key is not RSA.
    pub fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        let certificate = Certificate::from_der(&der)
            .map_err(|e| SigningError::EncodingError(format!("Failed to parse certificate: {e}")))?;
        let tbs = &certificate.tbs_certificate;

        let issuer_der = tbs.issuer.to_der()?;
        let serial_der = tbs.serial_number.to_der()?;

        let spki = &tbs.subject_public_key_info;
        if spki.algorithm.oid.to_string() != RSA_ENCRYPTION_OID {
            return Err(SigningError::EncodingError(format!(
                "certificate key algorithm {} is not rsaEncryption",
                spki.algorithm.oid
            )));
        }
        let modulus_len = rsa_modulus_len(spki.subject_public_key.raw_bytes())?;

        Ok(Self {
            issuer_der,
            serial_der,
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial_hex: hex::encode_upper(tbs.serial_number.as_bytes()),
            not_before: unix_time(tbs.validity.not_before.to_unix_duration()),
            not_after: unix_time(tbs.validity.not_after.to_unix_duration()),
            modulus_len,
            der: der.into_boxed_slice(),
        })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// `IssuerAndSerialNumber ::= SEQUENCE { issuer Name, serialNumber INTEGER }`
    #[must_use]
    pub fn issuer_and_serial_number(&self) -> Vec<u8> {
        writer::sequence(&[&self.issuer_der, &self.serial_der])
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn serial_hex(&self) -> &str {
        &self.serial_hex
    }

    #[must_use]
    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    #[must_use]
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// RSA modulus size in bytes; every PKCS#1 v1.5 signature has exactly this length.
    #[must_use]
    pub fn rsa_modulus_len(&self) -> usize {
        self.modulus_len
    }

    /// # Errors
    /// `EncodingError` if OpenSSL cannot re-read the certificate.
    pub fn to_pem(&self) -> SigningResult<Vec<u8>> {
        certificate_pem(&self.der)
    }
}

/// `-----BEGIN CERTIFICATE-----` armour for a DER certificate.
///
/// # Errors
/// `EncodingError` when `der` is not a certificate OpenSSL accepts.
pub fn certificate_pem(der: &[u8]) -> SigningResult<Vec<u8>> {
    Ok(openssl::x509::X509::from_der(der)?.to_pem()?)
}

fn unix_time(since_epoch: std::time::Duration) -> Option<DateTime<Utc>> {
    i64::try_from(since_epoch.as_secs())
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

/// Length of the modulus in `RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }`.
fn rsa_modulus_len(rsa_public_key: &[u8]) -> SigningResult<usize> {
    let key = asn1::read_single(rsa_public_key)?;
    key.expect_tag(ASN1_SEQUENCE_TAG, "RSAPublicKey")?;
    let fields = key.children()?;
    let modulus = fields
        .first()
        .ok_or_else(|| SigningError::EncodingError("RSAPublicKey without modulus".into()))?;
    modulus.expect_tag(ASN1_INTEGER_TAG, "RSA modulus")?;
    let significant = modulus
        .content
        .iter()
        .position(|b| *b != 0)
        .map_or(0, |first| modulus.content.len() - first);
    if significant == 0 {
        return Err(SigningError::EncodingError("RSA modulus is zero".into()));
    }
    Ok(significant)
}

impl fmt::Debug for SigningCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SigningCertificate(subject={}, serial={}, modulus_bits={})",
            self.subject,
            self.serial_hex,
            self.modulus_len * 8
        )
    }
}
