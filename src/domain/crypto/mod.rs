//! Foundational cryptographic domain types.
//!
//! Strongly-typed wrappers for the signing certificate, SHA-256 digests and
//! raw RSA signature values passed between the token and the CMS builder.

mod cert;
mod digest;
mod signature;

pub use cert::{certificate_pem, SigningCertificate};
pub use digest::DocumentDigest;
pub use signature::RawSignature;
