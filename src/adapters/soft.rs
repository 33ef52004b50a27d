//! Software signing token backed by an in-memory RSA key.
//!
//! Behaves like a hardware token towards the workflow: it must be logged in
//! before signing, and it locks after [`MAX_LOGIN_ATTEMPTS`] wrong PINs.

use std::path::Path;

use openssl::{
    pkey::Private,
    rsa::{Padding, Rsa},
    x509::X509,
};

use super::token::{SigningToken, TokenDescription, TokenKind};
use crate::{
    domain::{
        crypto::{DocumentDigest, RawSignature, SigningCertificate},
        types::TokenPin,
    },
    infra::error::{SigningError, SigningResult, TokenError},
};

/// Wrong PINs accepted before the token locks.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

pub struct SoftToken {
    key: Rsa<Private>,
    certificate_der: Vec<u8>,
    chain: Vec<Vec<u8>>,
    label: String,
    /// `None` accepts any PIN and starts logged in.
    pin: Option<TokenPin>,
    logged_in: bool,
    failed_logins: u32,
}

impl SoftToken {
    /// Create a token from a key and the matching certificate.
    ///
    /// # Errors
    /// `EncodingError` if the certificate is unusable, `NoSuchKey` if the key
    /// does not belong to it.
    pub fn new(
        key: Rsa<Private>,
        certificate_der: Vec<u8>,
        pin: Option<TokenPin>,
    ) -> SigningResult<Self> {
        let certificate = SigningCertificate::from_der(certificate_der)?;
        let public = X509::from_der(certificate.as_der())?.public_key()?.rsa()?;
        if public.n() != key.n() || public.e() != key.e() {
            return Err(TokenError::NoSuchKey(format!(
                "private key does not match certificate '{}'",
                certificate.subject()
            ))
            .into());
        }
        Ok(Self {
            key,
            label: certificate.subject().to_string(),
            certificate_der: certificate.as_der().to_vec(),
            chain: Vec::new(),
            logged_in: pin.is_none(),
            pin,
            failed_logins: 0,
        })
    }

    /// Create a token from PEM encoded key and certificate bytes.
    ///
    /// # Errors
    /// `EncodingError` if either PEM block cannot be decoded.
    pub fn from_pem(key_pem: &[u8], cert_pem: &[u8], pin: Option<TokenPin>) -> SigningResult<Self> {
        let key = Rsa::private_key_from_pem(key_pem)?;
        let cert = X509::from_pem(cert_pem)?;
        Self::new(key, cert.to_der()?, pin)
    }

    /// Read PEM key and certificate from disk.
    pub fn from_pem_files(
        key_path: &Path,
        cert_path: &Path,
        pin: Option<TokenPin>,
    ) -> SigningResult<Self> {
        let read = |path: &Path| {
            std::fs::read(path)
                .map_err(|e| SigningError::IoError(format!("Failed to read {}: {e}", path.display())))
        };
        log::info!(
            "Loading software token from {} and {}",
            key_path.display(),
            cert_path.display()
        );
        Self::from_pem(&read(key_path)?, &read(cert_path)?, pin)
    }

    /// Certificates returned by [`SigningToken::chain_certificates_der`].
    #[must_use]
    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.chain = chain;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn ensure_logged_in(&self) -> SigningResult<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(TokenError::NotLoggedIn.into())
        }
    }
}

impl SigningToken for SoftToken {
    fn kind(&self) -> TokenKind {
        TokenKind::Software
    }

    fn login(&mut self, pin: &TokenPin) -> SigningResult<()> {
        if self.failed_logins >= MAX_LOGIN_ATTEMPTS {
            return Err(TokenError::Locked.into());
        }
        let accepted = self
            .pin
            .as_ref()
            .map_or(true, |expected| expected.as_bytes() == pin.as_bytes());
        if !accepted {
            self.failed_logins += 1;
            log::warn!(
                "Software token login failed ({}/{MAX_LOGIN_ATTEMPTS})",
                self.failed_logins
            );
            return Err(if self.failed_logins >= MAX_LOGIN_ATTEMPTS {
                TokenError::Locked
            } else {
                TokenError::AuthenticationFailed
            }
            .into());
        }
        self.failed_logins = 0;
        self.logged_in = true;
        log::debug!("Software token '{}' logged in", self.label);
        Ok(())
    }

    fn certificate_der(&mut self) -> SigningResult<Vec<u8>> {
        Ok(self.certificate_der.clone())
    }

    fn chain_certificates_der(&mut self) -> SigningResult<Vec<Vec<u8>>> {
        Ok(self.chain.clone())
    }

    fn sign_digest(&mut self, digest: &DocumentDigest) -> SigningResult<RawSignature> {
        self.ensure_logged_in()?;
        let digest_info = digest.digest_info();
        let mut signature = vec![0u8; self.key.size() as usize];
        let len = self
            .key
            .private_encrypt(&digest_info, &mut signature, Padding::PKCS1)?;
        signature.truncate(len);
        log::debug!("Software token produced {len} byte signature");
        Ok(RawSignature::new(signature))
    }

    fn describe(&mut self) -> SigningResult<TokenDescription> {
        Ok(TokenDescription {
            kind: TokenKind::Software,
            label: self.label.clone(),
            manufacturer: "OpenSSL".into(),
            model: format!("RSA-{}", self.key.size() * 8),
            serial: SigningCertificate::from_der(self.certificate_der.clone())?
                .serial_hex()
                .to_string(),
        })
    }
}
