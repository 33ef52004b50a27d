//! PKCS#7 / CMS `SignedData` domain wrapper.
//! Newtype around the DER `ContentInfo` plus the signed attribute types.

use std::fmt;

pub mod attributes;
pub mod parse;

/// DER `ContentInfo { signedData, [0] EXPLICIT SignedData }`.
#[derive(Clone, PartialEq, Eq)]
pub struct CmsSignedData {
    der: Vec<u8>,
}

impl CmsSignedData {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.der.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
    /// Upper-case hex, as written into the PDF `/Contents` string.
    #[must_use]
    pub fn to_hex_upper(&self) -> String {
        hex::encode_upper(&self.der)
    }
}

impl fmt::Debug for CmsSignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmsSignedData(len={})", self.der.len())
    }
}

pub use attributes::{SignedAttribute, SignedAttributes};
pub use parse::{parse_signed_data, ParsedAttribute, ParsedSignedData, ParsedSignerInfo};
