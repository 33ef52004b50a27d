//! Error types for PDF signing operations.
//! Error handling types and result definitions for the token, CMS and PDF layers.

use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Failures reported by a signing token (hardware or software).
///
/// These are surfaced to the caller immediately; the core never retries them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("no token present")]
    NotPresent,

    #[error("authentication failed (wrong PIN)")]
    AuthenticationFailed,

    #[error("token is locked")]
    Locked,

    #[error("no matching key or certificate on token: {0}")]
    NoSuchKey(String),

    #[error("token session is not logged in")]
    NotLoggedIn,

    #[error("token driver error: {0}")]
    Driver(String),
}

/// Comprehensive error types for signing operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Token error: {0}")]
    #[diagnostic(help("check that the token is inserted and the PIN is correct"))]
    Token(#[from] TokenError),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Signature size mismatch: expected {expected} bytes for the certificate key, got {actual}")]
    SignatureSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid byte range: {0}")]
    InvalidByteRange(String),

    #[error("Signature too large: {required} hex digits needed, {reserved} reserved")]
    #[diagnostic(help("re-run with a larger signature reservation"))]
    SignatureTooLarge { required: usize, reserved: usize },

    #[error("Malformed PDF: {0}")]
    MalformedPdf(String),

    #[error("Verification error: {0}")]
    VerificationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::EncodingError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::EncodingError(format!("OpenSSL: {error}"))
    }
}

impl From<lopdf::Error> for SigningError {
    fn from(error: lopdf::Error) -> Self {
        SigningError::MalformedPdf(error.to_string())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

#[cfg(feature = "pkcs11-backend")]
impl From<cryptoki::error::Error> for SigningError {
    fn from(error: cryptoki::error::Error) -> Self {
        use cryptoki::error::{Error, RvError};
        let token_error = match error {
            Error::Pkcs11(RvError::PinIncorrect | RvError::PinInvalid | RvError::PinLenRange, _) => {
                TokenError::AuthenticationFailed
            }
            Error::Pkcs11(RvError::PinLocked | RvError::PinExpired, _) => TokenError::Locked,
            Error::Pkcs11(
                RvError::TokenNotPresent
                | RvError::DeviceRemoved
                | RvError::TokenNotRecognized
                | RvError::SlotIdInvalid,
                _,
            ) => TokenError::NotPresent,
            Error::Pkcs11(RvError::UserNotLoggedIn, _) => TokenError::NotLoggedIn,
            Error::Pkcs11(RvError::KeyHandleInvalid | RvError::ObjectHandleInvalid, _) => {
                TokenError::NoSuchKey(error.to_string())
            }
            other => TokenError::Driver(other.to_string()),
        };
        SigningError::Token(token_error)
    }
}

impl SigningError {
    /// True for embedder-side contract violations that a caller can fix by
    /// re-running the placeholder phase (bigger reservation or fixed input).
    #[must_use]
    pub fn is_embedder_contract_violation(&self) -> bool {
        matches!(
            self,
            SigningError::InvalidByteRange(_)
                | SigningError::SignatureTooLarge { .. }
                | SigningError::MalformedPdf(_)
        )
    }
}
