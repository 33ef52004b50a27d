//! CMS `SignedData` builder tests against openssl-generated identities.

mod common;

use std::{cell::Cell, sync::Arc};

use chrono::{TimeZone, Utc};
use common::{fixed_time, TestIdentity};
use openssl::{hash::MessageDigest, sign::Verifier, x509::X509};
use pdf_token_signer::{
    domain::pkcs7::parse_signed_data, CmsSignedDataBuilder, DocumentDigest, FixedClock,
    RawSignature, SigningError, SigningToken,
};

fn builder() -> CmsSignedDataBuilder {
    CmsSignedDataBuilder::new(Arc::new(FixedClock(fixed_time())))
}

#[test]
fn round_trip_message_digest_and_signature() {
    let identity = TestIdentity::generate(2048, "CMS Round Trip");
    let mut token = identity.token();
    token.login(&common::pin()).unwrap();

    let document_digest = DocumentDigest::of(b"two byte range spans");
    let cms = builder()
        .build(&document_digest, &identity.cert_der, |d| token.sign_digest(d))
        .unwrap();

    assert_eq!(cms.as_der()[0], 0x30);
    let parsed = parse_signed_data(cms.as_der()).unwrap();
    assert_eq!(
        parsed.signer.message_digest().unwrap(),
        document_digest.as_bytes().to_vec()
    );
    assert_eq!(parsed.signer.signing_time(), Some(fixed_time()));
    assert_eq!(parsed.certificates, vec![identity.cert_der.clone()]);
    assert!(!parsed.encap_content_present);

    let public = X509::from_der(&identity.cert_der).unwrap().public_key().unwrap();
    let mut verifier = Verifier::new(MessageDigest::sha256(), &public).unwrap();
    verifier.update(&parsed.signer.signed_attrs_set_der()).unwrap();
    assert!(verifier.verify(&parsed.signer.signature).unwrap());
}

#[test]
fn sign_fn_receives_signed_attributes_digest() {
    let identity = TestIdentity::generate(2048, "CMS Attrs Digest");
    let mut token = identity.token();
    token.login(&common::pin()).unwrap();

    let document_digest = DocumentDigest::of(b"document");
    let seen = Cell::new(None);
    let cms = builder()
        .build(&document_digest, &identity.cert_der, |d| {
            seen.set(Some(*d));
            token.sign_digest(d)
        })
        .unwrap();

    let seen = seen.get().unwrap();
    assert_ne!(seen, document_digest);
    let parsed = parse_signed_data(cms.as_der()).unwrap();
    assert_eq!(seen, DocumentDigest::of(&parsed.signer.signed_attrs_set_der()));
}

#[test]
fn signed_attributes_are_der_canonical() {
    let identity = TestIdentity::generate(2048, "CMS Canonical");
    let mut token = identity.token();
    token.login(&common::pin()).unwrap();

    let cms = builder()
        .build(&DocumentDigest::of(b"x"), &identity.cert_der, |d| token.sign_digest(d))
        .unwrap();
    let parsed = parse_signed_data(cms.as_der()).unwrap();
    assert_eq!(parsed.signer.signed_attrs.len(), 3);
    assert_eq!(
        parsed.signer.reencode_signed_attrs(),
        parsed.signer.signed_attrs_set_der()
    );
}

#[test]
fn wrong_signature_length_is_size_mismatch() {
    let identity = TestIdentity::generate(2048, "CMS Size");
    let err = builder()
        .build(&DocumentDigest::of(b"x"), &identity.cert_der, |_| {
            Ok(RawSignature::new(vec![0x42; 255]))
        })
        .unwrap_err();
    match err {
        SigningError::SignatureSizeMismatch { expected, actual } => {
            assert_eq!(expected, 256);
            assert_eq!(actual, 255);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unparseable_certificate_is_encoding_error() {
    let called = Cell::new(false);
    let err = builder()
        .build(&DocumentDigest::of(b"x"), &[0x30, 0x03, 0x02, 0x01, 0x00], |_| {
            called.set(true);
            Ok(RawSignature::new(vec![0; 256]))
        })
        .unwrap_err();
    assert!(matches!(err, SigningError::EncodingError(_)));
    assert!(!called.get());
}

#[test]
fn stub_signer_of_modulus_length_is_accepted() {
    let identity = TestIdentity::generate(2048, "CMS Stub");
    let cms = builder()
        .build(&DocumentDigest::of(b"x"), &identity.cert_der, |_| {
            Ok(RawSignature::new(vec![0xA5; 256]))
        })
        .unwrap();
    let parsed = parse_signed_data(cms.as_der()).unwrap();
    assert_eq!(parsed.signer.signature, vec![0xA5; 256]);
}

#[test]
fn output_is_deterministic_for_fixed_clock() {
    let identity = TestIdentity::generate(2048, "CMS Deterministic");
    let mut token = identity.token();
    token.login(&common::pin()).unwrap();
    let digest = DocumentDigest::of(b"same input");

    let a = builder()
        .build(&digest, &identity.cert_der, |d| token.sign_digest(d))
        .unwrap();
    let b = builder()
        .build(&digest, &identity.cert_der, |d| token.sign_digest(d))
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn additional_certificates_follow_signer() {
    let ca = TestIdentity::generate(2048, "Test Root CA");
    let leaf = TestIdentity::issued(2048, "Test Signer", Some(&ca));
    let mut token = leaf.token();
    token.login(&common::pin()).unwrap();

    let cms = builder()
        .with_additional_certs(vec![ca.cert_der.clone()])
        .build(&DocumentDigest::of(b"x"), &leaf.cert_der, |d| token.sign_digest(d))
        .unwrap();
    let parsed = parse_signed_data(cms.as_der()).unwrap();
    assert_eq!(parsed.certificates, vec![leaf.cert_der.clone(), ca.cert_der.clone()]);
}

#[test]
fn signing_time_after_2049_uses_generalized_time() {
    let identity = TestIdentity::generate(2048, "CMS Time");
    let at = Utc.with_ymd_and_hms(2051, 1, 1, 0, 0, 0).unwrap();
    let cms = builder()
        .build_at(&DocumentDigest::of(b"x"), &identity.cert_der, &at, |_| {
            Ok(RawSignature::new(vec![1; 256]))
        })
        .unwrap();
    let parsed = parse_signed_data(cms.as_der()).unwrap();
    let time = parsed.signer.attribute("1.2.840.113549.1.9.5").unwrap();
    assert_eq!(time.value_der[0], 0x18);
    assert_eq!(parsed.signer.signing_time(), Some(at));
}
