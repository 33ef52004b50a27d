//! Read-only structure discovery over the `lopdf` object model: trailer,
//! catalog, first page, existing interactive form and signatures.

use lopdf::{xref::XrefEntry, Dictionary, Document, Object};

use super::{writer::XrefFormat, ObjectId};
use crate::{SigningError, SigningResult};

impl From<lopdf::ObjectId> for ObjectId {
    fn from((number, generation): lopdf::ObjectId) -> Self {
        Self::new(number, generation)
    }
}

impl From<ObjectId> for lopdf::ObjectId {
    fn from(id: ObjectId) -> Self {
        (id.number, id.generation)
    }
}

/// Document catalog and its dictionary as last defined.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub id: ObjectId,
    pub dict: Dictionary,
}

/// First leaf of the page tree with its resolved `/Annots` array.
#[derive(Debug, Clone)]
pub struct FirstPage {
    pub id: ObjectId,
    pub dict: Dictionary,
    pub annots: Vec<Object>,
}

/// A pre-existing interactive form carried into the new `/AcroForm`.
#[derive(Debug, Clone)]
pub struct ExistingAcroForm {
    pub fields: Vec<ObjectId>,
    /// Every entry other than `/Fields` and `/SigFlags`.
    pub other_entries: Dictionary,
}

/// Everything the placeholder phase needs to know about the original file.
#[derive(Debug, Clone)]
pub struct DocumentStructure {
    pub startxref: usize,
    pub xref_format: XrefFormat,
    pub size: Option<u32>,
    pub info: Option<Object>,
    pub id: Option<Object>,
    pub catalog: Catalog,
    /// `max(highest object number in use, /Size - 1)`.
    pub highest_object_number: u32,
    pub first_page: Option<FirstPage>,
    pub existing_acro_form: Option<ExistingAcroForm>,
    pub signatures: Vec<ObjectId>,
}

/// Discover the structure of `data`.
///
/// # Errors
/// `MalformedPdf` if `startxref`, the cross-reference chain, the catalog or
/// an existing `/AcroForm` cannot be read, or the document is encrypted.
pub fn analyze(data: &[u8]) -> SigningResult<DocumentStructure> {
    let startxref = find_startxref(data)?;
    let xref_format = xref_format_at(data, startxref);
    let document = Document::load_mem(data)?;
    if document.trailer.has(b"Encrypt") {
        return Err(SigningError::MalformedPdf(
            "encrypted documents are not supported".into(),
        ));
    }

    let catalog = locate_catalog(&document)?;
    let size = document
        .trailer
        .get(b"Size")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|s| u32::try_from(s).ok());
    let highest_object_number = document
        .max_id
        .max(size.map_or(0, |s| s.saturating_sub(1)))
        .max(catalog.id.number);

    let first_page = first_page(&document);
    let existing_acro_form = existing_acro_form(&document, &catalog.dict)?;
    let signatures = signature_dictionaries(&document)
        .map(|(id, _)| id)
        .collect();

    log::debug!(
        "PDF structure: startxref={startxref} ({xref_format:?}), objects={}, highest={highest_object_number}, catalog={}, first_page={:?}, acro_form={}",
        document.objects.len(),
        catalog.id,
        first_page.as_ref().map(|p| p.id),
        existing_acro_form.is_some()
    );

    Ok(DocumentStructure {
        startxref,
        xref_format,
        size,
        info: document.trailer.get(b"Info").ok().cloned(),
        id: document.trailer.get(b"ID").ok().cloned(),
        catalog,
        highest_object_number,
        first_page,
        existing_acro_form,
        signatures,
    })
}

/// Value of the last `startxref` keyword.
///
/// # Errors
/// `MalformedPdf` when the keyword is missing or its offset lies outside the file.
pub fn find_startxref(data: &[u8]) -> SigningResult<usize> {
    let keyword = b"startxref";
    let pos = data
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| SigningError::MalformedPdf("missing startxref".into()))?;
    let digits: String = data[pos + keyword.len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|b| char::from(*b))
        .collect();
    digits
        .parse::<usize>()
        .ok()
        .filter(|offset| *offset < data.len())
        .ok_or_else(|| SigningError::MalformedPdf(format!("invalid startxref offset {digits:?}")))
}

/// A section starting with the `xref` keyword is a table; anything else is
/// a cross-reference stream object.
fn xref_format_at(data: &[u8], startxref: usize) -> XrefFormat {
    let section = &data[startxref..];
    let start = section
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(section.len());
    if section[start..].starts_with(b"xref") {
        XrefFormat::Table
    } else {
        XrefFormat::Stream
    }
}

/// Resolve the catalog from the trailer `/Root`, falling back to the last
/// `/Type /Catalog` dictionary when the trailer carries no root.
fn locate_catalog(document: &Document) -> SigningResult<Catalog> {
    if let Ok(root) = document.trailer.get(b"Root").and_then(Object::as_reference) {
        let dict = document.get_dictionary(root).map_err(|e| {
            SigningError::MalformedPdf(format!("catalog {root:?} cannot be read: {e}"))
        })?;
        return Ok(Catalog {
            id: root.into(),
            dict: dict.clone(),
        });
    }
    log::warn!("Trailer has no /Root; looking for a /Type /Catalog object");
    document
        .objects
        .iter()
        .filter_map(|(id, object)| {
            object
                .as_dict()
                .ok()
                .filter(|dict| has_name(dict, b"Type", b"Catalog"))
                .map(|dict| Catalog {
                    id: (*id).into(),
                    dict: dict.clone(),
                })
        })
        .last()
        .ok_or_else(|| SigningError::MalformedPdf("no document catalog found".into()))
}

/// First leaf of the page tree, or `None` when it cannot be resolved.
fn first_page(document: &Document) -> Option<FirstPage> {
    let (_, id) = document.get_pages().into_iter().next()?;
    let dict = document.get_dictionary(id).ok()?;
    let annots = match dict.get(b"Annots") {
        Err(_) => Vec::new(),
        Ok(value) => match document.dereference(value) {
            Ok((_, Object::Array(items))) => items.clone(),
            _ => {
                log::warn!("Page {id:?} has an unreadable /Annots entry; leaving the page untouched");
                return None;
            }
        },
    };
    Some(FirstPage {
        id: id.into(),
        dict: dict.clone(),
        annots,
    })
}

/// Read the catalog's `/AcroForm`, inline or referenced, if any.
fn existing_acro_form(
    document: &Document,
    catalog: &Dictionary,
) -> SigningResult<Option<ExistingAcroForm>> {
    let Ok(value) = catalog.get(b"AcroForm") else {
        return Ok(None);
    };
    let form = match document.dereference(value)? {
        (_, Object::Dictionary(dict)) => dict,
        (_, other) => {
            return Err(SigningError::MalformedPdf(format!(
                "catalog /AcroForm is not a dictionary: {other:?}"
            )))
        }
    };
    let fields = match form.get(b"Fields") {
        Err(_) => Vec::new(),
        Ok(value) => match document.dereference(value)? {
            (_, Object::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .map(ObjectId::from)
                .collect(),
            _ => {
                return Err(SigningError::MalformedPdf(
                    "existing /AcroForm /Fields is not an array".into(),
                ))
            }
        },
    };
    let mut other_entries = Dictionary::new();
    for (key, value) in form.iter() {
        if key.as_slice() != b"Fields" && key.as_slice() != b"SigFlags" {
            other_entries.set(key.clone(), value.clone());
        }
    }
    Ok(Some(ExistingAcroForm {
        fields,
        other_entries,
    }))
}

/// Every dictionary that looks like a signature value: `/Type /Sig` or a `/ByteRange`.
pub fn signature_dictionaries(document: &Document) -> impl Iterator<Item = (ObjectId, &Dictionary)> {
    document.objects.iter().filter_map(|(id, object)| {
        object
            .as_dict()
            .ok()
            .filter(|dict| has_name(dict, b"Type", b"Sig") || dict.has(b"ByteRange"))
            .map(|dict| (ObjectId::from(*id), dict))
    })
}

/// Offset of the `n g obj` header of an uncompressed object.
#[must_use]
pub fn object_offset(document: &Document, id: ObjectId) -> Option<usize> {
    match document.reference_table.get(id.number) {
        Some(XrefEntry::Normal { offset, generation }) if *generation == id.generation => {
            usize::try_from(*offset).ok()
        }
        _ => None,
    }
}

/// `/key` holds the name `value`.
#[must_use]
pub fn has_name(dict: &Dictionary, key: &[u8], value: &[u8]) -> bool {
    matches!(dict.get(key), Ok(Object::Name(name)) if name.as_slice() == value)
}
