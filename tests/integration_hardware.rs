//! Hardware integration tests for PKCS#11 tokens
//!
//! These tests require a token behind a PKCS#11 module (SoftHSM works) and
//! the PKCS11_MODULE and TOKEN_PIN environment variables. PKCS11_SLOT and
//! PKCS11_KEY_LABEL are optional.
//! Run with: cargo test --test integration_hardware -- --ignored

#![cfg(feature = "pkcs11-backend")]

mod common;

use std::{env, path::PathBuf};

use common::sample_pdf;
use pdf_token_signer::{
    adapters::{pkcs11, token::connect},
    SigningToken, SlotSelector, TokenPin, TokenSource, VerifyWorkflow,
};

fn hardware_source() -> (TokenSource, TokenPin) {
    let module = env::var("PKCS11_MODULE").expect("PKCS11_MODULE environment variable must be set");
    let pin = env::var("TOKEN_PIN").expect("TOKEN_PIN environment variable must be set");
    let slot = env::var("PKCS11_SLOT")
        .ok()
        .map_or(SlotSelector::Index(0), |s| s.parse().expect("PKCS11_SLOT"));
    (
        TokenSource::Pkcs11 {
            module: PathBuf::from(module),
            slot,
            key_label: env::var("PKCS11_KEY_LABEL").ok(),
        },
        TokenPin::new(pin).expect("PIN should be valid"),
    )
}

#[test]
#[ignore = "Requires PKCS#11 token"]
fn lists_slots_with_tokens() {
    let module = env::var("PKCS11_MODULE").expect("PKCS11_MODULE environment variable must be set");
    let slots = pkcs11::list_slots(&PathBuf::from(module)).expect("module should load");
    assert!(!slots.is_empty(), "no token present");
    for slot in &slots {
        println!("#{} (id {}): {}", slot.index, slot.slot_id, slot.description);
    }
}

#[test]
#[ignore = "Requires PKCS#11 token"]
fn reads_certificate_after_login() {
    let (source, pin) = hardware_source();
    let mut token = connect(&source).expect("token should open");
    println!("{}", token.describe().expect("token info"));

    token.login(&pin).expect("login should succeed");
    let der = token.certificate_der().expect("signing certificate");
    let certificate = pdf_token_signer::SigningCertificate::from_der(der).expect("RSA certificate");
    println!("Signer: {} (serial {})", certificate.subject(), certificate.serial_hex());
    assert!(certificate.rsa_modulus_len() >= 256);
}

#[test]
#[ignore = "Requires PKCS#11 token"]
fn signs_and_verifies_document() {
    let (source, pin) = hardware_source();
    let mut token = connect(&source).expect("token should open");

    let workflow = common::workflow();
    let mut metadata = workflow.metadata();
    metadata.reason = Some("Hardware integration test".into());
    let signed = workflow
        .sign_bytes(sample_pdf(16_000), token.as_mut(), Some(&pin), &metadata)
        .expect("signing with hardware token");

    let report = VerifyWorkflow::new().run(signed.as_bytes()).expect("verification");
    assert!(report.success(), "{:?}", report.problems);
    println!(
        "Signed {} bytes as {}",
        signed.len(),
        report.signer.map(|s| s.subject).unwrap_or_default()
    );
}
