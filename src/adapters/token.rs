//! Signing token port shared by the hardware and software backends.
//!
//! A token owns its session state (login, failed attempts) and is therefore
//! driven through `&mut self` by exactly one workflow at a time.

use std::{fmt, path::PathBuf};

#[cfg(feature = "pkcs11-backend")]
use crate::domain::types::SlotSelector;
use crate::domain::{
    crypto::{DocumentDigest, RawSignature},
    types::TokenPin,
};
use crate::infra::error::SigningResult;

/// Backend implementation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Vendor PKCS#11 module (USB smartcard, eToken, SoftHSM).
    #[cfg(feature = "pkcs11-backend")]
    Pkcs11,
    /// PEM key and certificate held in memory.
    Software,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "pkcs11-backend")]
            Self::Pkcs11 => write!(f, "PKCS#11"),
            Self::Software => write!(f, "software"),
        }
    }
}

/// Identity of a connected token as reported by its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDescription {
    pub kind: TokenKind,
    pub label: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
}

impl fmt::Display for TokenDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} token '{}' ({} {}, serial {})",
            self.kind, self.label, self.manufacturer, self.model, self.serial
        )
    }
}

/// Unified token operations trait.
///
/// Provides a common interface for signing regardless of where the private
/// key lives.
pub trait SigningToken: Send {
    /// Get the backend type.
    fn kind(&self) -> TokenKind;

    /// Authenticate with the token using its user PIN.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` on a wrong PIN, `Locked` once the token refuses
    /// further attempts.
    fn login(&mut self, pin: &TokenPin) -> SigningResult<()>;

    /// DER of the signing certificate.
    ///
    /// # Errors
    ///
    /// `NoSuchKey` if the token holds no usable certificate.
    fn certificate_der(&mut self) -> SigningResult<Vec<u8>>;

    /// Further certificates stored on the token (issuing CAs), signer excluded.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot enumerate its objects.
    fn chain_certificates_der(&mut self) -> SigningResult<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    /// Raw RSA PKCS#1 v1.5 signature over the SHA-256 `DigestInfo` of `digest`.
    ///
    /// # Errors
    ///
    /// `NotLoggedIn` before a successful [`SigningToken::login`], `NoSuchKey`
    /// if the private key is missing.
    fn sign_digest(&mut self, digest: &DocumentDigest) -> SigningResult<RawSignature>;

    /// Token label, manufacturer, model and serial.
    ///
    /// # Errors
    ///
    /// Returns error if the token information cannot be read.
    fn describe(&mut self) -> SigningResult<TokenDescription>;
}

/// Where the signing key lives.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Slot of a vendor PKCS#11 module, optionally narrowed to a key label.
    #[cfg(feature = "pkcs11-backend")]
    Pkcs11 {
        module: PathBuf,
        slot: SlotSelector,
        key_label: Option<String>,
    },
    /// PEM key and certificate files. `pin` guards the key like a token PIN.
    Software {
        key: PathBuf,
        certificate: PathBuf,
        pin: Option<TokenPin>,
    },
}

/// Connect to the token described by `source`.
///
/// # Errors
///
/// Returns error if the module, slot or key files cannot be opened.
pub fn connect(source: &TokenSource) -> SigningResult<Box<dyn SigningToken>> {
    match source {
        #[cfg(feature = "pkcs11-backend")]
        TokenSource::Pkcs11 {
            module,
            slot,
            key_label,
        } => {
            log::info!("Connecting to PKCS#11 {slot} via {}", module.display());
            Ok(Box::new(super::pkcs11::Pkcs11Token::open(
                module,
                slot,
                key_label.clone(),
            )?))
        }
        TokenSource::Software {
            key,
            certificate,
            pin,
        } => Ok(Box::new(super::soft::SoftToken::from_pem_files(
            key,
            certificate,
            pin.clone(),
        )?)),
    }
}
