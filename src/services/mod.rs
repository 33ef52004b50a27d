//! Service layer module root.
//! Contains the stateless CMS, PDF patching and verification services.

pub mod embedder;
pub mod pkcs7_builder;
pub mod placeholder;
pub mod signed_attributes_builder;
pub mod verification;

pub use embedder::PdfSignatureEmbedderService;
pub use pkcs7_builder::CmsSignedDataBuilder;
pub use placeholder::PdfPlaceholderService;
pub use signed_attributes_builder::SignedAttributesBuilder;
pub use verification::VerificationService;
