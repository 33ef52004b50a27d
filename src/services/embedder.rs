//! PDF Signature Embedder Service (phase B).
//!
//! Fills the fixed-width `/ByteRange` slot and splices the upper-case hex CMS
//! into the reserved `/Contents` gap. The document length never changes.

use crate::{
    domain::{
        constants::BYTE_RANGE_PLACEHOLDER,
        crypto::DocumentDigest,
        pdf::{ByteRange, ContentsGap, PlaceholderPdf, SignedPdf},
    },
    infra::error::{SigningError, SigningResult},
};

pub struct PdfSignatureEmbedderService;

impl Default for PdfSignatureEmbedderService {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfSignatureEmbedderService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// SHA-256 over `pdf[0..gap_start] ++ pdf[gap_end..]` of the document as
    /// it will look once the `/ByteRange` slot is filled.
    ///
    /// The slot lies inside the signed span, so the values written by
    /// [`Self::embed`] are exactly the ones hashed here.
    pub fn document_digest(&self, placeholder: &PlaceholderPdf) -> SigningResult<DocumentDigest> {
        Self::check_placeholder(placeholder, placeholder.gap())?;
        let bytes = placeholder.as_bytes();
        let gap = placeholder.gap();
        let slot = placeholder.byte_range_slot();
        let slot_end = slot + BYTE_RANGE_PLACEHOLDER.len();
        let filled = placeholder.byte_range().to_fixed_width()?;

        let digest = DocumentDigest::of_parts(&[
            &bytes[..slot],
            filled.as_bytes(),
            &bytes[slot_end..gap.start],
            &bytes[gap.end..],
        ]);
        log::debug!(
            "Document digest over {} {}: {}",
            placeholder.byte_range(),
            bytes.len() - gap.len(),
            digest.to_hex()
        );
        Ok(digest)
    }

    /// Write the `/ByteRange` and the hex CMS into a copy of `placeholder`.
    ///
    /// # Errors
    /// * `InvalidByteRange` if `gap_start`/`gap_end` differ from the reserved gap
    ///   or the placeholder bytes were altered
    /// * `SignatureTooLarge` if the hex CMS exceeds the reservation
    pub fn embed(
        &self,
        placeholder: &PlaceholderPdf,
        gap_start: usize,
        gap_end: usize,
        cms_der: &[u8],
    ) -> SigningResult<SignedPdf> {
        let gap = ContentsGap {
            start: gap_start,
            end: gap_end,
        };
        if gap != placeholder.gap() {
            return Err(SigningError::InvalidByteRange(format!(
                "gap {gap_start}..{gap_end} does not match the reserved gap {}..{}",
                placeholder.gap_start(),
                placeholder.gap_end()
            )));
        }
        Self::check_placeholder(placeholder, gap)?;

        let hex = hex::encode_upper(cms_der);
        if hex.len() > gap.hex_capacity() {
            return Err(SigningError::SignatureTooLarge {
                required: hex.len(),
                reserved: gap.hex_capacity(),
            });
        }

        let byte_range = ByteRange::covering(gap, placeholder.len());
        let filled = byte_range.to_fixed_width()?;
        let slot = placeholder.byte_range_slot();

        let mut signed = placeholder.as_bytes().to_vec();
        signed[slot..slot + filled.len()].copy_from_slice(filled.as_bytes());
        signed[gap.start + 1..gap.start + 1 + hex.len()].copy_from_slice(hex.as_bytes());

        Self::post_write_check(placeholder, &signed, byte_range)?;
        log::info!(
            "Embedded {} byte CMS ({} of {} hex digits used), ByteRange {byte_range}",
            cms_der.len(),
            hex.len(),
            gap.hex_capacity()
        );
        Ok(SignedPdf {
            bytes: signed,
            byte_range,
        })
    }

    /// The gap must still be `<` + zeros + `>` and the slot still unfilled.
    fn check_placeholder(placeholder: &PlaceholderPdf, gap: ContentsGap) -> SigningResult<()> {
        let bytes = placeholder.as_bytes();
        if gap.is_empty() || gap.end > bytes.len() || gap.len() != placeholder.reservation().gap_len() {
            return Err(SigningError::InvalidByteRange(format!(
                "gap {}..{} is outside the document or not the reserved size",
                gap.start, gap.end
            )));
        }
        if bytes[gap.start] != b'<'
            || bytes[gap.end - 1] != b'>'
            || bytes[gap.start + 1..gap.end - 1].iter().any(|b| *b != b'0')
        {
            return Err(SigningError::InvalidByteRange(
                "reserved /Contents bytes were modified".into(),
            ));
        }
        let slot = placeholder.byte_range_slot();
        let slot_end = slot + BYTE_RANGE_PLACEHOLDER.len();
        if slot_end > gap.start || &bytes[slot..slot_end] != BYTE_RANGE_PLACEHOLDER.as_bytes() {
            return Err(SigningError::InvalidByteRange(
                "/ByteRange placeholder slot missing or already filled".into(),
            ));
        }
        Ok(())
    }

    fn post_write_check(
        placeholder: &PlaceholderPdf,
        signed: &[u8],
        byte_range: ByteRange,
    ) -> SigningResult<()> {
        if signed.len() != placeholder.len() {
            return Err(SigningError::InvalidByteRange(format!(
                "document length changed from {} to {}",
                placeholder.len(),
                signed.len()
            )));
        }
        let [first, gap_start, gap_end, tail] = byte_range.0;
        if first != 0 || gap_end + tail != signed.len() || signed[gap_start] != b'<' || signed[gap_end - 1] != b'>' {
            return Err(SigningError::InvalidByteRange(format!(
                "byte range {byte_range} does not frame the /Contents string"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::pdf::{test_fixtures::minimal_pdf, SignatureMetadata, SignatureReservation, UnsignedPdf},
        services::placeholder::PdfPlaceholderService,
    };
    use chrono::{TimeZone, Utc};

    fn placeholder(bytes: usize) -> PlaceholderPdf {
        let metadata = SignatureMetadata::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        PdfPlaceholderService::new()
            .reserve(
                &UnsignedPdf::from_bytes(minimal_pdf()).unwrap(),
                SignatureReservation::from_bytes(bytes).unwrap(),
                &metadata,
            )
            .unwrap()
    }

    #[test]
    fn embed_keeps_length_and_fills_slots() {
        let p = placeholder(64);
        let cms = vec![0x30, 0x03, 0x02, 0x01, 0x01];
        let signed = PdfSignatureEmbedderService::new()
            .embed(&p, p.gap_start(), p.gap_end(), &cms)
            .unwrap();
        assert_eq!(signed.len(), p.len());

        let bytes = signed.as_bytes();
        let gap = p.gap();
        assert_eq!(&bytes[gap.start..gap.start + 11], b"<3003020101");
        assert!(bytes[gap.start + 11..gap.end - 1].iter().all(|b| *b == b'0'));
        assert_eq!(signed.byte_range().0, [0, gap.start, gap.end, p.len() - gap.end]);

        let slot = p.byte_range_slot();
        let written = std::str::from_utf8(&bytes[slot..slot + BYTE_RANGE_PLACEHOLDER.len()]).unwrap();
        assert_eq!(written, signed.byte_range().to_fixed_width().unwrap());
    }

    #[test]
    fn digest_matches_signed_document_spans() {
        let p = placeholder(64);
        let service = PdfSignatureEmbedderService::new();
        let digest = service.document_digest(&p).unwrap();
        let signed = service.embed(&p, p.gap_start(), p.gap_end(), &[0xAB; 10]).unwrap();
        let bytes = signed.as_bytes();
        let [_, gap_start, gap_end, _] = signed.byte_range().0;
        assert_eq!(
            DocumentDigest::of_parts(&[&bytes[..gap_start], &bytes[gap_end..]]),
            digest
        );
    }

    #[test]
    fn digest_is_stable_across_reservations_of_identical_input() {
        let service = PdfSignatureEmbedderService::new();
        assert_eq!(
            service.document_digest(&placeholder(128)).unwrap(),
            service.document_digest(&placeholder(128)).unwrap()
        );
    }

    #[test]
    fn oversized_signature_is_rejected() {
        let p = placeholder(16);
        let err = PdfSignatureEmbedderService::new()
            .embed(&p, p.gap_start(), p.gap_end(), &[0u8; 17])
            .unwrap_err();
        match err {
            SigningError::SignatureTooLarge { required, reserved } => {
                assert_eq!(required, 34);
                assert_eq!(reserved, 32);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn exact_fit_is_accepted() {
        let p = placeholder(16);
        let signed = PdfSignatureEmbedderService::new()
            .embed(&p, p.gap_start(), p.gap_end(), &[0xFF; 16])
            .unwrap();
        let gap = p.gap();
        assert!(signed.as_bytes()[gap.start + 1..gap.end - 1].iter().all(|b| *b == b'F'));
    }

    #[test]
    fn mismatched_gap_is_invalid_byte_range() {
        let p = placeholder(16);
        let err = PdfSignatureEmbedderService::new()
            .embed(&p, p.gap_start() + 1, p.gap_end(), &[0x30, 0x00])
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidByteRange(_)));
    }

    #[test]
    fn tampered_placeholder_is_invalid_byte_range() {
        let mut p = placeholder(16);
        let at = p.gap_start() + 3;
        p.bytes[at] = b'7';
        let err = PdfSignatureEmbedderService::new()
            .embed(&p, p.gap_start(), p.gap_end(), &[0x30, 0x00])
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidByteRange(_)));
    }
}
