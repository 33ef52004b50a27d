use std::fmt;

/// Raw RSA PKCS#1 v1.5 signature value as returned by the token.
#[derive(Clone, Eq, PartialEq)]
pub struct RawSignature {
    bytes: Box<[u8]>,
}

impl RawSignature {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for RawSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawSignature(len={})", self.bytes.len())
    }
}
