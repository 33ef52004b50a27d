//! Type-safe wrappers for token inputs.

use std::fmt;
use std::str::FromStr;

use crate::{SigningError, SigningResult};

/// Token user PIN. Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone)]
pub struct TokenPin(String);

impl TokenPin {
    /// Create a new `TokenPin` after validation
    pub fn new(pin: impl AsRef<str>) -> SigningResult<Self> {
        let pin = pin.as_ref();
        Self::validate_pin(pin)?;
        Ok(TokenPin(pin.to_string()))
    }

    /// Get the PIN as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// PKCS#11 leaves PIN rules to the token; only reject values no token accepts.
    fn validate_pin(pin: &str) -> SigningResult<()> {
        if pin.is_empty() {
            return Err(SigningError::InvalidInput("PIN must not be empty".into()));
        }
        if pin.len() > 64 {
            return Err(SigningError::InvalidInput(format!(
                "PIN too long: {} characters (maximum 64)",
                pin.len()
            )));
        }
        if pin.chars().any(char::is_control) {
            return Err(SigningError::InvalidInput(
                "PIN must not contain control characters".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPin(***)")
    }
}

impl FromStr for TokenPin {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// How to pick a slot among those with a token present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSelector {
    /// Position in the list of slots with a token present.
    Index(usize),
    /// Token label (trailing padding ignored).
    Label(String),
}

impl Default for SlotSelector {
    fn default() -> Self {
        SlotSelector::Index(0)
    }
}

impl FromStr for SlotSelector {
    type Err = SigningError;

    /// A bare number selects by index, anything else by label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SigningError::InvalidInput("empty slot selector".into()));
        }
        Ok(s.parse::<usize>()
            .map_or_else(|_| SlotSelector::Label(s.to_string()), SlotSelector::Index))
    }
}

impl fmt::Display for SlotSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotSelector::Index(i) => write!(f, "slot #{i}"),
            SlotSelector::Label(l) => write!(f, "token '{l}'"),
        }
    }
}
