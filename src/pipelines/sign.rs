//! `SignWorkflow` orchestrates core signing steps.
//!
//! reserve → digest → token signature → CMS → embed, over an in-memory
//! document, plus a file front end that never touches the input and only
//! replaces the output once the whole pipeline succeeded.

use std::{
    io::Write,
    path::Path,
    sync::Arc,
};

use crate::{
    adapters::{clock::Clock, token::SigningToken},
    domain::{
        pdf::{SignatureMetadata, SignatureReservation, SignedPdf, UnsignedPdf},
        types::TokenPin,
    },
    services::{
        embedder::PdfSignatureEmbedderService, pkcs7_builder::CmsSignedDataBuilder,
        placeholder::PdfPlaceholderService,
    },
    SigningError, SigningResult,
};

pub struct SignWorkflow {
    clock: Arc<dyn Clock>,
    reservation: SignatureReservation,
    include_chain: bool,
}

impl SignWorkflow {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            reservation: SignatureReservation::default(),
            include_chain: false,
        }
    }

    #[must_use]
    pub fn with_reservation(mut self, reservation: SignatureReservation) -> Self {
        self.reservation = reservation;
        self
    }

    /// Embed the token's other certificates after the signer certificate.
    #[must_use]
    pub fn with_chain(mut self, include_chain: bool) -> Self {
        self.include_chain = include_chain;
        self
    }

    #[must_use]
    pub fn reservation(&self) -> SignatureReservation {
        self.reservation
    }

    /// Metadata stamped with the workflow clock's current time.
    #[must_use]
    pub fn metadata(&self) -> SignatureMetadata {
        SignatureMetadata::new(self.clock.now())
    }

    /// Sign an in-memory PDF.
    ///
    /// `metadata.signing_time` is used both for `/M` and for the CMS
    /// signingTime attribute. When `pin` is `None` the token must already be
    /// logged in.
    pub fn sign_bytes(
        &self,
        pdf: Vec<u8>,
        token: &mut dyn SigningToken,
        pin: Option<&TokenPin>,
        metadata: &SignatureMetadata,
    ) -> SigningResult<SignedPdf> {
        // 1. Reserve the placeholder
        let unsigned = UnsignedPdf::from_bytes(pdf)?;
        let placeholder = PdfPlaceholderService::new().reserve(&unsigned, self.reservation, metadata)?;
        log::info!(
            "Step 1/4: reserved {} signature bytes, /Contents at {}..{}",
            self.reservation.bytes(),
            placeholder.gap_start(),
            placeholder.gap_end()
        );

        // 2. Digest over both ByteRange spans
        let embedder = PdfSignatureEmbedderService::new();
        let digest = embedder.document_digest(&placeholder)?;
        log::info!("Step 2/4: document digest {}", digest.to_hex());

        // 3. Token session
        if let Some(pin) = pin {
            token.login(pin)?;
        }
        let certificate_der = token.certificate_der()?;
        let chain = if self.include_chain {
            token.chain_certificates_der()?
        } else {
            Vec::new()
        };
        log::info!(
            "Step 3/4: signing with {} token ({} chain certificate(s))",
            token.kind(),
            chain.len()
        );

        // 4. CMS around the token signature, then splice
        let cms = CmsSignedDataBuilder::new(Arc::clone(&self.clock))
            .with_additional_certs(chain)
            .build_at(&digest, &certificate_der, &metadata.signing_time, |attrs_digest| {
                token.sign_digest(attrs_digest)
            })?;
        let signed = embedder.embed(
            &placeholder,
            placeholder.gap_start(),
            placeholder.gap_end(),
            cms.as_der(),
        )?;
        log::info!(
            "Step 4/4: embedded {} byte CMS, final size {} bytes",
            cms.len(),
            signed.len()
        );
        Ok(signed)
    }

    /// Sign `input` into `output`.
    ///
    /// # Errors
    /// `InvalidInput` if both paths name the same file; nothing is written
    /// to `output` unless signing succeeded.
    pub fn sign_file(
        &self,
        input: &Path,
        output: &Path,
        token: &mut dyn SigningToken,
        pin: Option<&TokenPin>,
        metadata: &SignatureMetadata,
    ) -> SigningResult<SignedPdf> {
        if same_file(input, output) {
            return Err(SigningError::InvalidInput(format!(
                "output {} would overwrite the input; choose a different path",
                output.display()
            )));
        }
        let data = std::fs::read(input).map_err(|e| {
            SigningError::IoError(format!("Failed to read input file {}: {e}", input.display()))
        })?;
        log::info!("Signing {} ({} bytes)", input.display(), data.len());

        let signed = self.sign_bytes(data, token, pin, metadata)?;
        write_atomically(output, signed.as_bytes())?;
        log::info!("Wrote {}", output.display());
        Ok(signed)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Write through a temporary file in the destination directory, then rename.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> SigningResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| {
        SigningError::IoError(format!("Failed to write output file {}: {}", path.display(), e.error))
    })?;
    Ok(())
}
