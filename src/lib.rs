//! PDF Token Signer Library
//!
//! Adobe-Reader-compatible PDF signatures (`adbe.pkcs7.detached`) produced
//! with a PKCS#11 token: an incremental update reserves the `/Contents`
//! placeholder, the token signs the DER signed attributes, and the CMS
//! `SignedData` is spliced back without shifting a single byte.
//!
//! Layers:
//! - `domain`: DER primitives, certificate and digest types, CMS and PDF models
//! - `services`: placeholder reservation, embedding, CMS assembly, verification
//! - `adapters`: PKCS#11 and software tokens, clock
//! - `infra`: errors and configuration
//! - `pipelines`: sign and verify workflows

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use adapters::{
    clock::{Clock, FixedClock, SystemClock},
    soft::SoftToken,
    token::{SigningToken, TokenDescription, TokenKind, TokenSource},
};
pub use domain::{
    crypto::{DocumentDigest, RawSignature, SigningCertificate},
    pdf::{
        ByteRange, PlaceholderPdf, SignatureMetadata, SignatureReservation, SignedPdf, UnsignedPdf,
    },
    pkcs7::CmsSignedData,
    types::{SlotSelector, TokenPin},
    verification::{SignerSummary, VerificationReport},
};
pub use infra::error::{SigningError, SigningResult, TokenError};
pub use pipelines::{SignWorkflow, VerifyWorkflow};
pub use services::{
    CmsSignedDataBuilder, PdfPlaceholderService, PdfSignatureEmbedderService, VerificationService,
};
