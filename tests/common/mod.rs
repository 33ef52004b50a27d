//! Shared fixtures for integration tests: throwaway RSA identities and
//! generated PDF documents with valid cross-reference tables.

#![allow(dead_code)]

use std::{io::Write, sync::Arc};

use chrono::{DateTime, TimeZone, Utc};
use flate2::{write::ZlibEncoder, Compression};
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    x509::{X509Builder, X509NameBuilder},
};
use pdf_token_signer::{domain::pdf::parse, FixedClock, SignWorkflow, SoftToken, TokenPin};

pub const TEST_PIN: &str = "123456";

/// Key pair plus self-signed certificate.
pub struct TestIdentity {
    pub key: Rsa<Private>,
    pub cert_der: Vec<u8>,
}

impl TestIdentity {
    pub fn generate(bits: u32, common_name: &str) -> Self {
        Self::issued(bits, common_name, None)
    }

    /// Certificate signed by `issuer` (self-signed when `None`).
    pub fn issued(bits: u32, common_name: &str, issuer: Option<&TestIdentity>) -> Self {
        let key = Rsa::generate(bits).expect("rsa key");
        let pkey = PKey::from_rsa(key.clone()).expect("pkey");

        let mut name = X509NameBuilder::new().expect("name builder");
        name.append_entry_by_text("CN", common_name).expect("CN");
        name.append_entry_by_text("O", "PDF Token Signer Tests").expect("O");
        let name = name.build();

        let mut builder = X509Builder::new().expect("x509 builder");
        builder.set_version(2).expect("version");
        let serial = BigNum::from_u32(0x1234_5678).expect("bn").to_asn1_integer().expect("serial");
        builder.set_serial_number(&serial).expect("serial");
        builder.set_subject_name(&name).expect("subject");
        builder.set_pubkey(&pkey).expect("pubkey");
        builder.set_not_before(&Asn1Time::days_from_now(0).expect("time")).expect("nb");
        builder.set_not_after(&Asn1Time::days_from_now(365).expect("time")).expect("na");
        match issuer {
            Some(ca) => {
                let ca_cert = openssl::x509::X509::from_der(&ca.cert_der).expect("ca cert");
                builder.set_issuer_name(ca_cert.subject_name()).expect("issuer");
                let ca_key = PKey::from_rsa(ca.key.clone()).expect("ca pkey");
                builder.sign(&ca_key, MessageDigest::sha256()).expect("sign");
            }
            None => {
                builder.set_issuer_name(&name).expect("issuer");
                builder.sign(&pkey, MessageDigest::sha256()).expect("sign");
            }
        }

        Self {
            key,
            cert_der: builder.build().to_der().expect("cert der"),
        }
    }

    /// Software token guarded by [`TEST_PIN`].
    pub fn token(&self) -> SoftToken {
        SoftToken::new(self.key.clone(), self.cert_der.clone(), Some(pin())).expect("soft token")
    }
}

pub fn pin() -> TokenPin {
    TokenPin::new(TEST_PIN).expect("pin")
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
}

pub fn workflow() -> SignWorkflow {
    SignWorkflow::new(Arc::new(FixedClock(fixed_time())))
}

/// One-page PDF whose content stream is padded until the file reaches about
/// `target_len` bytes. Has `/Info` and `/ID` in the trailer.
pub fn sample_pdf(target_len: usize) -> Vec<u8> {
    sample_pdf_with_text(target_len, "")
}

/// [`sample_pdf`] with `extra` shown as an additional text line.
pub fn sample_pdf_with_text(target_len: usize, extra: &str) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 760 Td 14 TL\n");
    if !extra.is_empty() {
        content.push_str(&format!("({extra}) Tj\n"));
    }
    let mut line = 0;
    while content.len() + 900 < target_len {
        content.push_str(&format!("(Line {line:05} of the generated test document.) '\n"));
        line += 1;
    }
    content.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R /Lang (en-US) >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        "<< /Producer (pdf-token-signer tests) /Title (Sample) >>".to_string(),
    ];
    pdf_from_objects(
        &objects,
        &format!("/Size {} /Root 1 0 R /Info 6 0 R /ID [<{SAMPLE_ID}> <{SAMPLE_ID}>]", objects.len() + 1),
    )
}

pub const SAMPLE_ID: &str = "0A1B2C3D4E5F60718293A4B5C6D7E8F9";

/// Classic-xref PDF from object bodies numbered from 1.
pub fn pdf_from_objects(objects: &[String], trailer_entries: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f\r\n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n\r\n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< {trailer_entries} >>\nstartxref\n{xref_at}\n%%EOF\n").as_bytes(),
    );
    out
}

/// Append an incremental update defining `objects` (number, body), with a
/// classic xref section chained to the previous one.
pub fn append_update(pdf: &[u8], objects: &[(u32, String)], trailer_entries: &str) -> Vec<u8> {
    let prev = parse::find_startxref(pdf).expect("startxref");
    let mut out = pdf.to_vec();
    let mut entries = Vec::new();
    for (number, body) in objects {
        entries.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }
    entries.sort_unstable();
    let xref_at = out.len();
    out.extend_from_slice(b"xref\n");
    for (number, offset) in entries {
        out.extend_from_slice(format!("{number} 1\n{offset:010} 00000 n\r\n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< {trailer_entries} /Prev {prev} >>\nstartxref\n{xref_at}\n%%EOF\n")
            .as_bytes(),
    );
    out
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("deflate");
    encoder.finish().expect("deflate")
}

/// PDF 1.5 layout: catalog, page tree and page inside a compressed object
/// stream (object 4), indexed by a compressed cross-reference stream
/// (object 6). The content stream (object 5) quotes `n g obj` text.
pub fn object_stream_pdf() -> Vec<u8> {
    let compressed = [
        "<< /Type /Catalog /Pages 2 0 R /PageMode /UseNone >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents 5 0 R >>",
    ];
    let mut header = String::new();
    let mut body = String::new();
    for (i, object) in compressed.iter().enumerate() {
        header.push_str(&format!("{} {} ", i + 1, body.len()));
        body.push_str(object);
        body.push('\n');
    }
    let object_stream = deflate(format!("{header}{body}").as_bytes());

    let content = "BT /F1 12 Tf 72 760 Td (1 0 obj << /Type /Catalog >> endobj) Tj ET";

    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let stream_at = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N 3 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            object_stream.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&object_stream);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    let content_at = out.len();
    out.extend_from_slice(
        format!("5 0 obj\n<< /Length {} >>\nstream\n{content}\nendstream\nendobj\n", content.len())
            .as_bytes(),
    );
    let xref_at = out.len();

    let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
    for index in 0..3u16 {
        rows.push(2);
        rows.extend_from_slice(&4u32.to_be_bytes());
        rows.extend_from_slice(&index.to_be_bytes());
    }
    for offset in [stream_at, content_at, xref_at] {
        rows.push(1);
        rows.extend_from_slice(&u32::try_from(offset).expect("offset").to_be_bytes());
        rows.extend_from_slice(&[0, 0]);
    }
    let rows = deflate(&rows);
    out.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /Size 7 /Root 1 0 R /ID [<{SAMPLE_ID}> <{SAMPLE_ID}>] \
             /W [1 4 2] /Index [0 7] /Filter /FlateDecode /Length {} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&rows);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_at}\n%%EOF\n").as_bytes());
    out
}

/// Count non-overlapping occurrences of `needle`.
pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
