//! PDF signature placeholder service (phase A of the embedder).
//!
//! Appends an incremental update holding the signature dictionary, a new
//! `/AcroForm`, the signature widget and a re-emitted catalog, with a
//! fixed-width `/ByteRange` slot and a zero-filled `/Contents` reservation.
//! The original bytes are never modified.

use lopdf::{Dictionary, Object};

use crate::{
    domain::{
        constants::{
            ACRO_FORM_SIG_FLAGS, BYTE_RANGE_PLACEHOLDER, PDF_SIGNATURE_FILTER,
            PDF_SIGNATURE_SUB_FILTER, SIGNATURE_WIDGET_FLAGS,
        },
        pdf::{
            parse::{self, DocumentStructure, FirstPage},
            writer::{self, IncrementalUpdate, TrailerFields},
            ContentsGap, ObjectId, PlaceholderPdf, SignatureMetadata, SignatureReservation,
            UnsignedPdf,
        },
    },
    SigningError, SigningResult,
};

const CONTENTS_KEY: &str = "/Contents ";

pub struct PdfPlaceholderService;

impl Default for PdfPlaceholderService {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfPlaceholderService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reserve a signature of `reservation` bytes in `pdf`.
    ///
    /// Objects `N+1` (signature dictionary), `N+2` (AcroForm) and `N+3`
    /// (widget) are allocated above the highest object number `N` in use.
    /// The catalog and first page are re-emitted under their own numbers.
    /// An original ending in a cross-reference stream gets a stream section
    /// as object `N+4`. Identical inputs always produce identical output.
    ///
    /// # Errors
    /// * `MalformedPdf` when the catalog or object numbers cannot be determined
    /// * `InvalidInput` when the document already carries a signature
    pub fn reserve(
        &self,
        pdf: &UnsignedPdf,
        reservation: SignatureReservation,
        metadata: &SignatureMetadata,
    ) -> SigningResult<PlaceholderPdf> {
        let data = pdf.as_bytes();
        let structure = parse::analyze(data)?;
        if let Some(existing) = structure.signatures.first() {
            return Err(SigningError::InvalidInput(format!(
                "document already carries a signature (object {existing}); co-signing is not supported"
            )));
        }

        let n = structure.highest_object_number;
        let sig_id = ObjectId::new(n + 1, 0);
        let acro_form_id = ObjectId::new(n + 2, 0);
        let widget_id = ObjectId::new(n + 3, 0);
        log::info!(
            "Reserving {} signature bytes: signature {sig_id}, AcroForm {acro_form_id}, widget {widget_id}",
            reservation.bytes()
        );

        let mut update = IncrementalUpdate::new(data);

        let catalog = Self::catalog_body(&structure, acro_form_id)?;
        update.add_object(structure.catalog.id, &catalog);

        if let Some(page) = &structure.first_page {
            update.add_object(page.id, &Self::page_body(page, widget_id)?);
        }

        let sig_body = Self::signature_dictionary(reservation, metadata);
        let sig_at = update.add_object(sig_id, sig_body.as_bytes());
        let (slot_rel, contents_rel) = Self::placeholder_positions(&sig_body)?;
        let byte_range_slot = sig_at + slot_rel;
        let gap = ContentsGap {
            start: sig_at + contents_rel,
            end: sig_at + contents_rel + reservation.gap_len(),
        };

        let acro_form = Self::acro_form_body(&structure, widget_id)?;
        update.add_object(acro_form_id, &acro_form);

        let widget = Self::widget_body(&structure, metadata, sig_id);
        update.add_object(widget_id, widget.as_bytes());

        let appended = update.finish(&TrailerFields {
            format: structure.xref_format,
            size: n + 4,
            root: structure.catalog.id,
            prev: structure.startxref,
            info: structure.info.as_ref().map(Self::serialized).transpose()?,
            id: structure.id.as_ref().map(Self::serialized).transpose()?,
        })?;

        let mut bytes = Vec::with_capacity(data.len() + appended.len());
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(&appended);

        log::debug!(
            "Placeholder document: {} bytes, /Contents gap {}..{}, /ByteRange slot at {byte_range_slot}",
            bytes.len(),
            gap.start,
            gap.end
        );
        Ok(PlaceholderPdf {
            bytes,
            gap,
            byte_range_slot,
            signature_object: sig_id,
            reservation,
        })
    }

    fn serialized(value: &Object) -> SigningResult<Vec<u8>> {
        let mut out = Vec::new();
        writer::object(value, &mut out)?;
        Ok(out)
    }

    /// Catalog with every original entry kept and `/AcroForm` replaced.
    fn catalog_body(structure: &DocumentStructure, acro_form_id: ObjectId) -> SigningResult<Vec<u8>> {
        let dict = Self::with_last_entry(
            &structure.catalog.dict,
            "AcroForm",
            Object::Reference(acro_form_id.into()),
        );
        writer::dictionary(&dict)
    }

    /// First page with the widget appended to its `/Annots`, written inline.
    fn page_body(page: &FirstPage, widget_id: ObjectId) -> SigningResult<Vec<u8>> {
        let mut annots = page.annots.clone();
        annots.push(Object::Reference(widget_id.into()));
        writer::dictionary(&Self::with_last_entry(&page.dict, "Annots", Object::Array(annots)))
    }

    /// Copy of `dict` in its original order with `key` moved to the end and set to `value`.
    fn with_last_entry(dict: &Dictionary, key: &str, value: Object) -> Dictionary {
        let mut out = Dictionary::new();
        for (k, v) in dict.iter().filter(|(k, _)| k.as_slice() != key.as_bytes()) {
            out.set(k.clone(), v.clone());
        }
        out.set(key, value);
        out
    }

    fn signature_dictionary(reservation: SignatureReservation, metadata: &SignatureMetadata) -> String {
        let mut dict = format!(
            "<<\n/Type /Sig\n/Filter /{PDF_SIGNATURE_FILTER}\n/SubFilter /{PDF_SIGNATURE_SUB_FILTER}\n/ByteRange {BYTE_RANGE_PLACEHOLDER}\n{CONTENTS_KEY}<{}>\n/M {}",
            "0".repeat(reservation.hex_len()),
            writer::date_string(&metadata.signing_time)
        );
        let optional = [
            ("Name", &metadata.signer_name),
            ("Reason", &metadata.reason),
            ("Location", &metadata.location),
            ("ContactInfo", &metadata.contact_info),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                dict.push_str(&format!("\n/{key} {}", writer::text_string(value)));
            }
        }
        dict.push_str("\n>>");
        dict
    }

    /// Offsets of the `/ByteRange` slot and the `/Contents` `<` within the dictionary text.
    fn placeholder_positions(sig_body: &str) -> SigningResult<(usize, usize)> {
        let slot = sig_body.find(BYTE_RANGE_PLACEHOLDER);
        let contents = sig_body.find(CONTENTS_KEY).map(|p| p + CONTENTS_KEY.len());
        match (slot, contents) {
            (Some(slot), Some(contents)) => Ok((slot, contents)),
            _ => Err(SigningError::InvalidByteRange(
                "signature dictionary lost its placeholders".into(),
            )),
        }
    }

    fn acro_form_body(structure: &DocumentStructure, widget_id: ObjectId) -> SigningResult<Vec<u8>> {
        let mut fields: Vec<Object> = structure
            .existing_acro_form
            .iter()
            .flat_map(|form| form.fields.iter().map(|id| Object::Reference((*id).into())))
            .collect();
        fields.push(Object::Reference(widget_id.into()));

        let mut dict = Dictionary::new();
        dict.set("Fields", Object::Array(fields));
        dict.set("SigFlags", Object::Integer(i64::from(ACRO_FORM_SIG_FLAGS)));
        if let Some(form) = &structure.existing_acro_form {
            for (key, value) in form.other_entries.iter() {
                dict.set(key.clone(), value.clone());
            }
        }
        writer::dictionary(&dict)
    }

    fn widget_body(structure: &DocumentStructure, metadata: &SignatureMetadata, sig_id: ObjectId) -> String {
        let page = structure
            .first_page
            .as_ref()
            .map(|p| format!("\n/P {}", p.id))
            .unwrap_or_default();
        format!(
            "<<\n/Type /Annot\n/Subtype /Widget\n/FT /Sig\n/T {}\n/V {sig_id}{page}\n/Rect [0 0 0 0]\n/F {SIGNATURE_WIDGET_FLAGS}\n>>",
            writer::text_string(&metadata.field_name)
        )
    }
}
