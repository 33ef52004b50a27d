//! Verification domain types for signed PDF files.
//!
//! Aggregates the outcome of each check performed by the verification
//! service so callers can report exactly which part failed.

use chrono::{DateTime, Utc};

/// Result of verifying the last signature of a PDF.
///
/// - `byte_range_ok`: `/ByteRange` covers the whole file except the `/Contents` string
/// - `digest_ok`: recomputed document digest equals the messageDigest attribute
/// - `signature_ok`: RSA signature validates over `DER(signedAttrs)`
/// - `attrs_ok`: contentType is id-data and the attribute SET is canonically ordered
/// - `structure_ok`: `/Filter`, `/SubFilter` and the CMS shape are as expected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationReport {
    pub byte_range_ok: bool,
    pub digest_ok: bool,
    pub signature_ok: bool,
    pub attrs_ok: bool,
    pub structure_ok: bool,
    pub signer: Option<SignerSummary>,
    /// Human readable reasons for every failed check.
    pub problems: Vec<String>,
}

/// Identity and timing of the signer as recorded in the CMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSummary {
    pub subject: String,
    pub issuer: String,
    pub serial_hex: String,
    pub signing_time: Option<DateTime<Utc>>,
}

impl VerificationReport {
    /// Overall success indicator - returns true only if all checks passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.byte_range_ok && self.digest_ok && self.signature_ok && self.attrs_ok && self.structure_ok
    }

    pub(crate) fn problem(&mut self, message: impl Into<String>) {
        self.problems.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_every_check() {
        let mut report = VerificationReport {
            byte_range_ok: true,
            digest_ok: true,
            signature_ok: true,
            attrs_ok: true,
            structure_ok: true,
            ..VerificationReport::default()
        };
        assert!(report.success());
        report.signature_ok = false;
        assert!(!report.success());
    }
}
