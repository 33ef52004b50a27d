use std::fmt;

use sha2::{Digest, Sha256};

use crate::{
    domain::constants::{SHA256_DIGEST_INFO_PREFIX, SHA256_DIGEST_LEN},
    SigningError, SigningResult,
};

/// SHA-256 digest value.
///
/// Used both for the document digest (over the two `/ByteRange` spans) and for
/// the digest of the DER signed attributes handed to the token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentDigest([u8; SHA256_DIGEST_LEN]);

impl DocumentDigest {
    #[must_use]
    pub fn from_bytes(bytes: [u8; SHA256_DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// # Errors
    /// `InvalidInput` unless `bytes` is exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> SigningResult<Self> {
        let array: [u8; SHA256_DIGEST_LEN] = bytes.try_into().map_err(|_| {
            SigningError::InvalidInput(format!(
                "SHA-256 digest must be {SHA256_DIGEST_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// SHA-256 over the concatenation of `parts`.
    #[must_use]
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self::of_parts(&[data])
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SHA256_DIGEST_LEN] {
        &self.0
    }

    /// PKCS#1 v1.5 `DigestInfo` for this digest (what `CKM_RSA_PKCS` signs).
    #[must_use]
    pub fn digest_info(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SHA256_DIGEST_INFO_PREFIX.len() + SHA256_DIGEST_LEN);
        out.extend_from_slice(SHA256_DIGEST_INFO_PREFIX);
        out.extend_from_slice(&self.0);
        out
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DocumentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentDigest(sha256={})", self.to_hex())
    }
}
