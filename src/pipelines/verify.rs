//! `VerifyWorkflow`: high-level facade for verifying signed PDF files.
//!
//! Delegates to `VerificationService`; keeps symmetry with the sign workflow.

use std::path::Path;

use crate::{
    domain::verification::VerificationReport, services::verification::VerificationService,
    SigningError, SigningResult,
};

/// Orchestrates verification steps for a signed PDF.
pub struct VerifyWorkflow {
    svc: VerificationService,
}

impl Default for VerifyWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            svc: VerificationService::new(),
        }
    }

    /// Run verification over provided signed PDF bytes.
    pub fn run(&self, signed_pdf: &[u8]) -> SigningResult<VerificationReport> {
        self.svc.verify(signed_pdf)
    }

    /// Read and verify `path`.
    pub fn run_file(&self, path: &Path) -> SigningResult<VerificationReport> {
        let data = std::fs::read(path).map_err(|e| {
            SigningError::IoError(format!("Failed to read {}: {e}", path.display()))
        })?;
        self.run(&data)
    }
}
