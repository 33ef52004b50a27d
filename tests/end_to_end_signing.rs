//! End-to-End Signing Integration Tests
//!
//! Run the whole reserve → digest → token → CMS → embed workflow against
//! generated documents, with a software token standing in for hardware.

mod common;

use common::{
    append_update, count, fixed_time, object_stream_pdf, pin, sample_pdf, workflow, TestIdentity,
};
use pdf_token_signer::{
    domain::pkcs7::parse_signed_data, DocumentDigest, PdfPlaceholderService, RawSignature,
    SignatureReservation, SignedPdf, SigningError, SigningResult, SigningToken, TokenDescription,
    TokenError, TokenKind, TokenPin, UnsignedPdf, VerifyWorkflow,
};
use tempfile::TempDir;

/// Token returning a constant modulus-sized signature.
struct StubToken {
    cert_der: Vec<u8>,
    signatures: usize,
}

impl SigningToken for StubToken {
    fn kind(&self) -> TokenKind {
        TokenKind::Software
    }

    fn login(&mut self, _pin: &TokenPin) -> SigningResult<()> {
        Ok(())
    }

    fn certificate_der(&mut self) -> SigningResult<Vec<u8>> {
        Ok(self.cert_der.clone())
    }

    fn sign_digest(&mut self, _digest: &DocumentDigest) -> SigningResult<RawSignature> {
        self.signatures += 1;
        Ok(RawSignature::new(vec![0x5A; 256]))
    }

    fn describe(&mut self) -> SigningResult<TokenDescription> {
        Ok(TokenDescription {
            kind: TokenKind::Software,
            label: "stub".into(),
            manufacturer: "tests".into(),
            model: "RSA-2048".into(),
            serial: "0".into(),
        })
    }
}

/// DER of the CMS in `/Contents`, zero padding removed.
fn embedded_cms(signed: &SignedPdf) -> Vec<u8> {
    let [_, gap_start, gap_end, _] = signed.byte_range().0;
    let mut der = hex::decode(&signed.as_bytes()[gap_start + 1..gap_end - 1]).unwrap();
    assert_eq!(der[0], 0x30);
    let (header, len) = match der[1] {
        n if n < 0x80 => (2, n as usize),
        0x81 => (3, der[2] as usize),
        0x82 => (4, u16::from_be_bytes([der[2], der[3]]) as usize),
        0x83 => (5, (der[2] as usize) << 16 | (der[3] as usize) << 8 | der[4] as usize),
        other => panic!("unexpected length octet {other:#x}"),
    };
    assert!(der[header + len..].iter().all(|b| *b == 0));
    der.truncate(header + len);
    der
}

#[test]
fn ten_kilobyte_document_with_stub_signer() {
    let identity = TestIdentity::generate(2048, "Stub Signer");
    let mut token = StubToken {
        cert_der: identity.cert_der.clone(),
        signatures: 0,
    };
    let pdf = sample_pdf(10_240);
    assert!(pdf.len() >= 10_000);

    let workflow = workflow();
    let metadata = workflow.metadata();
    let signed = workflow
        .sign_bytes(pdf.clone(), &mut token, None, &metadata)
        .unwrap();

    assert_eq!(token.signatures, 1);
    assert_eq!(count(signed.as_bytes(), b"/Type /Sig"), 1);
    assert!(signed.as_bytes().starts_with(&pdf));

    let placeholder = PdfPlaceholderService::new()
        .reserve(
            &UnsignedPdf::from_bytes(pdf).unwrap(),
            workflow.reservation(),
            &metadata,
        )
        .unwrap();
    assert_eq!(signed.len(), placeholder.len());

    let cms = embedded_cms(&signed);
    let parsed = parse_signed_data(&cms).unwrap();
    assert_eq!(parsed.signer.signature, vec![0x5A; 256]);
    assert_eq!(parsed.certificates, vec![identity.cert_der]);
}

#[test]
fn soft_token_file_signing_verifies() {
    let identity = TestIdentity::generate(2048, "E2E Signer");
    let mut token = identity.token();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("contract.pdf");
    let output = dir.path().join("contract-signed.pdf");
    let original = sample_pdf(20_000);
    std::fs::write(&input, &original).unwrap();

    let workflow = workflow();
    let mut metadata = workflow.metadata();
    metadata.reason = Some("Approved".into());
    metadata.location = Some("Zürich".into());
    workflow
        .sign_file(&input, &output, &mut token, Some(&pin()), &metadata)
        .unwrap();

    assert_eq!(std::fs::read(&input).unwrap(), original);
    let report = VerifyWorkflow::new().run_file(&output).unwrap();
    assert!(report.success(), "{:?}", report.problems);
    let signer = report.signer.unwrap();
    assert!(signer.subject.contains("E2E Signer"));
    assert_eq!(signer.signing_time, Some(fixed_time()));
}

#[test]
fn signing_is_deterministic_for_fixed_clock() {
    let identity = TestIdentity::generate(2048, "Deterministic");
    let pdf = sample_pdf(4_000);
    let workflow = workflow();
    let metadata = workflow.metadata();

    let mut first_token = identity.token();
    let first = workflow
        .sign_bytes(pdf.clone(), &mut first_token, Some(&pin()), &metadata)
        .unwrap();
    let mut second_token = identity.token();
    let second = workflow
        .sign_bytes(pdf, &mut second_token, Some(&pin()), &metadata)
        .unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn chain_certificates_follow_the_signer() {
    let ca = TestIdentity::generate(2048, "E2E Root");
    let leaf = TestIdentity::issued(2048, "E2E Leaf", Some(&ca));
    let mut token = leaf.token().with_chain(vec![ca.cert_der.clone()]);

    let workflow = workflow().with_chain(true);
    let signed = workflow
        .sign_bytes(sample_pdf(3_000), &mut token, Some(&pin()), &workflow.metadata())
        .unwrap();
    let parsed = parse_signed_data(&embedded_cms(&signed)).unwrap();
    assert_eq!(parsed.certificates, vec![leaf.cert_der, ca.cert_der]);
}

#[test]
fn wrong_pin_writes_nothing() {
    let identity = TestIdentity::generate(2048, "Wrong PIN");
    let mut token = identity.token();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, sample_pdf(2_000)).unwrap();

    let workflow = workflow();
    let err = workflow
        .sign_file(
            &input,
            &output,
            &mut token,
            Some(&TokenPin::new("999999").unwrap()),
            &workflow.metadata(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SigningError::Token(TokenError::AuthenticationFailed)
    ));
    assert!(!output.exists());
}

#[test]
fn missing_login_is_not_logged_in() {
    let identity = TestIdentity::generate(2048, "No Login");
    let mut token = identity.token();
    let workflow = workflow();
    let err = workflow
        .sign_bytes(sample_pdf(2_000), &mut token, None, &workflow.metadata())
        .unwrap_err();
    assert!(matches!(err, SigningError::Token(TokenError::NotLoggedIn)));
}

#[test]
fn undersized_reservation_is_signature_too_large() {
    let identity = TestIdentity::generate(2048, "Too Large");
    let mut token = identity.token();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, sample_pdf(2_000)).unwrap();

    let workflow = workflow().with_reservation(SignatureReservation::from_bytes(128).unwrap());
    let err = workflow
        .sign_file(&input, &output, &mut token, Some(&pin()), &workflow.metadata())
        .unwrap_err();
    assert!(matches!(err, SigningError::SignatureTooLarge { reserved: 256, .. }));
    assert!(!output.exists());
}

#[test]
fn output_may_not_overwrite_input() {
    let identity = TestIdentity::generate(2048, "Same Path");
    let mut token = identity.token();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("doc.pdf");
    let original = sample_pdf(2_000);
    std::fs::write(&input, &original).unwrap();

    let workflow = workflow();
    let err = workflow
        .sign_file(&input, &input, &mut token, Some(&pin()), &workflow.metadata())
        .unwrap_err();
    assert!(matches!(err, SigningError::InvalidInput(_)));
    assert_eq!(std::fs::read(&input).unwrap(), original);
}

#[test]
fn signed_document_is_not_signed_again() {
    let identity = TestIdentity::generate(2048, "Twice");
    let workflow = workflow();
    let mut token = identity.token();
    let signed = workflow
        .sign_bytes(sample_pdf(2_000), &mut token, Some(&pin()), &workflow.metadata())
        .unwrap();

    let err = workflow
        .sign_bytes(signed.into_bytes(), &mut token, None, &workflow.metadata())
        .unwrap_err();
    assert!(matches!(err, SigningError::InvalidInput(_)));
}

#[test]
fn compressed_layouts_and_prior_updates_sign_and_verify() {
    let identity = TestIdentity::generate(2048, "Layouts");
    let workflow = workflow();
    let updated = append_update(
        &sample_pdf(3_000),
        &[(1, "<< /Type /Catalog /Pages 2 0 R /Lang (fr-CH) >>".to_string())],
        "/Size 7 /Root 1 0 R /Info 6 0 R",
    );
    for original in [object_stream_pdf(), updated] {
        let mut token = identity.token();
        let signed = workflow
            .sign_bytes(original.clone(), &mut token, Some(&pin()), &workflow.metadata())
            .unwrap();
        assert!(signed.as_bytes().starts_with(&original));

        let report = VerifyWorkflow::new().run(signed.as_bytes()).unwrap();
        assert!(report.success(), "{:?}", report.problems);
    }
}
