//! DER primitives shared by the CMS builder, the CMS parser and certificate inspection.

pub mod reader;
pub mod writer;

pub use reader::{read_all, read_element, read_single, DerElement};
