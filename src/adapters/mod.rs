//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - PKCS#11 hardware tokens (feature `pkcs11-backend`)
//! - A software token over PEM key material
//! - System time

pub mod clock;
#[cfg(feature = "pkcs11-backend")]
pub mod pkcs11;
pub mod soft;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use soft::SoftToken;
pub use token::{connect, SigningToken, TokenDescription, TokenKind, TokenSource};
