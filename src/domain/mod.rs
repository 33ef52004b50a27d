pub mod asn1;
pub mod constants;
pub mod crypto;
pub mod pdf;
pub mod pkcs7;
pub mod types;
pub mod verification;
