//! Verification service: checks the last signature of a signed PDF.
//!
//! The service sequences structural and cryptographic checks and aggregates
//! their outcomes into a domain `VerificationReport`. Only a document with
//! no signature dictionary at all is an error; every failed check is
//! recorded on the report instead.

use lopdf::{Dictionary, Document, Object};
use openssl::{hash::MessageDigest, sign::Verifier, x509::X509};

use crate::{
    domain::{
        constants::{OID_DATA_COMPLETE, PDF_SIGNATURE_FILTER, PDF_SIGNATURE_SUB_FILTER},
        crypto::{DocumentDigest, SigningCertificate},
        pdf::{parse, ByteRange, ObjectId},
        pkcs7::{parse_signed_data, ParsedSignedData},
        verification::{SignerSummary, VerificationReport},
    },
    SigningError, SigningResult,
};

/// Service performing structural & cryptographic verification of a signed PDF.
pub struct VerificationService;

impl Default for VerificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Verify the last signature dictionary of `signed_bytes`.
    ///
    /// Checks, in order:
    /// - `/Filter /Adobe.PPKLite` and `/SubFilter /adbe.pkcs7.detached`
    /// - `/ByteRange` covers the whole file except the `/Contents` string
    /// - CMS structure (single signer, detached `data` content)
    /// - recomputed document digest against the messageDigest attribute
    /// - contentType attribute and canonical attribute order
    /// - RSA signature over `DER(signedAttrs)` with the embedded certificate
    ///
    /// # Errors
    /// `VerificationError` if the document carries no signature dictionary.
    pub fn verify(&self, signed_bytes: &[u8]) -> SigningResult<VerificationReport> {
        let document = Document::load_mem(signed_bytes)
            .map_err(|e| SigningError::VerificationError(format!("unreadable PDF: {e}")))?;
        let (sig_id, sig_offset, dict) = Self::last_signature_dictionary(&document)?;
        log::debug!("Verifying signature dictionary {sig_id} at offset {sig_offset}");
        let mut report = VerificationReport::default();

        // 1. Filter / SubFilter
        let mut structure_ok = true;
        if !parse::has_name(dict, b"Filter", PDF_SIGNATURE_FILTER.as_bytes()) {
            structure_ok = false;
            report.problem(format!("/Filter is not /{PDF_SIGNATURE_FILTER}"));
        }
        if !parse::has_name(dict, b"SubFilter", PDF_SIGNATURE_SUB_FILTER.as_bytes()) {
            structure_ok = false;
            report.problem(format!("/SubFilter is not /{PDF_SIGNATURE_SUB_FILTER}"));
        }

        // 2. ByteRange framing
        let Ok(Object::String(contents, _)) = dict.get(b"Contents") else {
            report.problem("signature dictionary has no /Contents string");
            return Ok(report);
        };
        let byte_range = match Self::read_byte_range(dict) {
            Ok(range) => range,
            Err(e) => {
                report.problem(e.to_string());
                return Ok(report);
            }
        };
        report.byte_range_ok =
            Self::check_byte_range(byte_range, signed_bytes, sig_offset, contents, &mut report);
        if !report.byte_range_ok {
            return Ok(report);
        }

        // 3. CMS structure
        let parsed = match parse_signed_data(contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                report.problem(format!("CMS could not be decoded: {e}"));
                return Ok(report);
            }
        };
        if parsed.encap_content_present {
            structure_ok = false;
            report.problem("CMS is not detached: encapContentInfo carries content");
        }
        report.structure_ok = structure_ok;

        // 4. messageDigest
        let [_, gap_start, gap_end, _] = byte_range.0;
        let digest =
            DocumentDigest::of_parts(&[&signed_bytes[..gap_start], &signed_bytes[gap_end..]]);
        report.digest_ok = parsed.signer.message_digest().as_deref() == Some(digest.as_bytes().as_slice());
        if !report.digest_ok {
            report.problem(format!(
                "messageDigest does not match document digest {}",
                digest.to_hex()
            ));
        }

        // 5. Attributes
        report.attrs_ok = Self::check_attributes(&parsed, &mut report);

        // 6. Signature and signer
        match Self::check_signature(&parsed) {
            Ok((ok, certificate)) => {
                report.signature_ok = ok;
                if !ok {
                    report.problem("RSA signature over signed attributes does not verify");
                }
                report.signer = Some(SignerSummary {
                    subject: certificate.subject().to_string(),
                    issuer: certificate.issuer().to_string(),
                    serial_hex: certificate.serial_hex().to_string(),
                    signing_time: parsed.signer.signing_time(),
                });
            }
            Err(e) => report.problem(format!("signature check failed: {e}")),
        }

        log::info!(
            "Verification of {sig_id}: {}",
            if report.success() { "valid" } else { "INVALID" }
        );
        Ok(report)
    }

    /// The signature dictionary whose definition sits last in the file.
    fn last_signature_dictionary(document: &Document) -> SigningResult<(ObjectId, usize, &Dictionary)> {
        parse::signature_dictionaries(document)
            .filter_map(|(id, dict)| {
                let offset = parse::object_offset(document, id);
                if offset.is_none() {
                    log::warn!("Signature dictionary {id} is not a top-level object; skipping");
                }
                offset.map(|at| (id, at, dict))
            })
            .max_by_key(|(_, at, _)| *at)
            .ok_or_else(|| SigningError::VerificationError("no signature dictionary found".into()))
    }

    fn read_byte_range(dict: &Dictionary) -> SigningResult<ByteRange> {
        let values: Vec<usize> = dict
            .get(b"ByteRange")
            .and_then(Object::as_array)
            .map_err(|_| SigningError::InvalidByteRange("missing /ByteRange array".into()))?
            .iter()
            .map(|v| v.as_i64().ok().and_then(|i| usize::try_from(i).ok()))
            .collect::<Option<_>>()
            .ok_or_else(|| SigningError::InvalidByteRange("non-integer /ByteRange value".into()))?;
        let values: [usize; 4] = values.try_into().map_err(|v: Vec<usize>| {
            SigningError::InvalidByteRange(format!("/ByteRange has {} values, expected 4", v.len()))
        })?;
        Ok(ByteRange(values))
    }

    /// The range must start at 0, reach the end of the file and exclude
    /// exactly the `/Contents` string of the dictionary defined at `sig_offset`.
    fn check_byte_range(
        byte_range: ByteRange,
        data: &[u8],
        sig_offset: usize,
        contents: &[u8],
        report: &mut VerificationReport,
    ) -> bool {
        let [first, gap_start, gap_end, tail] = byte_range.0;
        let total_len = data.len();
        if first != 0 {
            report.problem(format!("/ByteRange starts at {first}, not 0"));
            return false;
        }
        if gap_end.checked_add(tail) != Some(total_len) {
            report.problem(format!(
                "/ByteRange {byte_range} does not reach the end of the {total_len} byte file"
            ));
            return false;
        }
        if gap_start <= sig_offset || gap_start + 2 > gap_end {
            report.problem(format!(
                "/ByteRange gap {gap_start}..{gap_end} is not inside signature object at {sig_offset}"
            ));
            return false;
        }

        let gap = &data[gap_start..gap_end];
        let key_ok = data[sig_offset..gap_start]
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .is_some_and(|last| data[sig_offset..=sig_offset + last].ends_with(b"/Contents"));
        let value_ok = gap[0] == b'<'
            && gap[gap.len() - 1] == b'>'
            && hex::decode(&gap[1..gap.len() - 1]).is_ok_and(|raw| raw == contents);
        if !key_ok || !value_ok {
            report.problem(format!(
                "/ByteRange gap {gap_start}..{gap_end} does not match the /Contents string"
            ));
            return false;
        }
        true
    }

    fn check_attributes(parsed: &ParsedSignedData, report: &mut VerificationReport) -> bool {
        let signer = &parsed.signer;
        let mut ok = true;
        let content_type_ok = signer
            .attribute("1.2.840.113549.1.9.3")
            .is_some_and(|a| a.value_der == OID_DATA_COMPLETE);
        if !content_type_ok || parsed.encap_content_type != OID_DATA_COMPLETE {
            ok = false;
            report.problem("contentType is not id-data");
        }
        if signer.reencode_signed_attrs() != signer.signed_attrs_set_der() {
            ok = false;
            report.problem("signed attributes are not in DER SET order");
        }
        ok
    }

    /// Verify with the first embedded certificate, which is the signer's.
    fn check_signature(parsed: &ParsedSignedData) -> SigningResult<(bool, SigningCertificate)> {
        let cert_der = parsed
            .certificates
            .first()
            .ok_or_else(|| SigningError::VerificationError("CMS carries no certificate".into()))?;
        let certificate = SigningCertificate::from_der(cert_der.clone())?;
        if certificate.issuer_and_serial_number() != parsed.signer.issuer_and_serial {
            return Err(SigningError::VerificationError(
                "signer identifier does not match the first certificate".into(),
            ));
        }
        let public_key = X509::from_der(cert_der)?.public_key()?;
        let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key)?;
        verifier.update(&parsed.signer.signed_attrs_set_der())?;
        Ok((verifier.verify(&parsed.signer.signature)?, certificate))
    }
}
