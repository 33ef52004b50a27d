//! Incremental update serialization.
//!
//! New and replaced objects are appended after the original bytes, followed
//! by a cross-reference section covering only those objects and a trailer
//! chaining back to the previous section through `/Prev`. The section is a
//! classic `xref` table or a cross-reference stream, matching the original.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Object, StringFormat};

use super::ObjectId;
use crate::{domain::constants::PDF_MAX_XREF_OFFSET, SigningError, SigningResult};

/// Shape of the last cross-reference section of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefFormat {
    Table,
    Stream,
}

/// Entries of the trailer written after the new xref section.
#[derive(Debug, Clone)]
pub struct TrailerFields {
    pub format: XrefFormat,
    /// One more than the highest object number written so far. A
    /// cross-reference stream takes this number itself.
    pub size: u32,
    pub root: ObjectId,
    pub prev: usize,
    /// Serialized `/Info` value carried over from the original trailer.
    pub info: Option<Vec<u8>>,
    /// Serialized `/ID` value carried over from the original trailer.
    pub id: Option<Vec<u8>>,
}

/// Appended section under construction.
pub struct IncrementalUpdate {
    base_len: usize,
    body: Vec<u8>,
    offsets: BTreeMap<u32, (u16, usize)>,
}

impl IncrementalUpdate {
    /// Start an update after `original`; a newline is inserted first when the
    /// original does not end with an end-of-line marker.
    #[must_use]
    pub fn new(original: &[u8]) -> Self {
        let mut body = Vec::new();
        if !matches!(original.last(), Some(b'\n' | b'\r')) {
            body.push(b'\n');
        }
        Self {
            base_len: original.len(),
            body,
            offsets: BTreeMap::new(),
        }
    }

    /// Absolute offset where the next byte will land.
    #[must_use]
    pub fn position(&self) -> usize {
        self.base_len + self.body.len()
    }

    /// Append `n g obj\n<body>\nendobj\n`; returns the absolute offset of `<body>`.
    pub fn add_object(&mut self, id: ObjectId, body: &[u8]) -> usize {
        self.offsets
            .insert(id.number, (id.generation, self.position()));
        self.body
            .extend_from_slice(format!("{} {} obj\n", id.number, id.generation).as_bytes());
        let body_offset = self.position();
        self.body.extend_from_slice(body);
        self.body.extend_from_slice(b"\nendobj\n");
        body_offset
    }

    /// Write the cross-reference section and trailer; returns the bytes to append.
    ///
    /// # Errors
    /// `MalformedPdf` if an offset does not fit the entry width of the section.
    pub fn finish(mut self, trailer: &TrailerFields) -> SigningResult<Vec<u8>> {
        let xref_offset = self.position();
        if xref_offset as u64 > PDF_MAX_XREF_OFFSET {
            return Err(SigningError::MalformedPdf(format!(
                "offset {xref_offset} exceeds the xref entry width"
            )));
        }
        match trailer.format {
            XrefFormat::Table => self.write_table(trailer),
            XrefFormat::Stream => self.write_stream(trailer)?,
        }
        self.body
            .extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
        Ok(self.body)
    }

    fn write_table(&mut self, trailer: &TrailerFields) {
        let mut xref = String::from("xref\n");
        for run in contiguous_runs(&self.offsets) {
            xref.push_str(&format!("{} {}\n", run[0].0, run.len()));
            for (_, (generation, offset)) in run {
                xref.push_str(&format!("{offset:010} {generation:05} n\r\n"));
            }
        }
        self.body.extend_from_slice(xref.as_bytes());
        self.body.extend_from_slice(b"trailer\n<<");
        let entries = trailer_entries(trailer, trailer.size);
        self.body.extend_from_slice(&entries);
        self.body.extend_from_slice(b" >>\n");
    }

    /// Uncompressed `/Type /XRef` stream with `/W [1 4 2]` rows, registered
    /// under object number `trailer.size`.
    fn write_stream(&mut self, trailer: &TrailerFields) -> SigningResult<()> {
        let stream_id = ObjectId::new(trailer.size, 0);
        self.offsets.insert(stream_id.number, (0, self.position()));

        let mut index = Vec::new();
        let mut rows = Vec::new();
        for run in contiguous_runs(&self.offsets) {
            index.push(format!("{} {}", run[0].0, run.len()));
            for (number, (generation, offset)) in run {
                let offset = u32::try_from(offset).map_err(|_| {
                    SigningError::MalformedPdf(format!(
                        "object {number} at {offset} does not fit a 4 byte xref stream field"
                    ))
                })?;
                rows.push(1u8);
                rows.extend_from_slice(&offset.to_be_bytes());
                rows.extend_from_slice(&generation.to_be_bytes());
            }
        }

        let mut dict = b"<< /Type /XRef".to_vec();
        dict.extend_from_slice(&trailer_entries(trailer, trailer.size + 1));
        dict.extend_from_slice(
            format!(
                " /Index [{}] /W [1 4 2] /Length {} >>\nstream\n",
                index.join(" "),
                rows.len()
            )
            .as_bytes(),
        );
        dict.extend_from_slice(&rows);
        dict.extend_from_slice(b"\nendstream");

        self.body.extend_from_slice(
            format!("{} {} obj\n", stream_id.number, stream_id.generation).as_bytes(),
        );
        self.body.extend_from_slice(&dict);
        self.body.extend_from_slice(b"\nendobj\n");
        Ok(())
    }
}

fn trailer_entries(trailer: &TrailerFields, size: u32) -> Vec<u8> {
    let mut out = format!(" /Size {size} /Root {} /Prev {}", trailer.root, trailer.prev).into_bytes();
    if let Some(info) = &trailer.info {
        out.extend_from_slice(b" /Info ");
        out.extend_from_slice(info);
    }
    if let Some(id) = &trailer.id {
        out.extend_from_slice(b" /ID ");
        out.extend_from_slice(id);
    }
    out
}

fn contiguous_runs(offsets: &BTreeMap<u32, (u16, usize)>) -> Vec<Vec<(u32, (u16, usize))>> {
    let mut runs: Vec<Vec<(u32, (u16, usize))>> = Vec::new();
    for (number, entry) in offsets {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|(last, _)| last + 1 == *number) => {
                run.push((*number, *entry));
            }
            _ => runs.push(vec![(*number, *entry)]),
        }
    }
    runs
}

/// Serialize a direct object read from the original document.
///
/// # Errors
/// `MalformedPdf` for a stream, which can only exist as an indirect object.
pub fn object(value: &Object, out: &mut Vec<u8>) -> SigningResult<()> {
    match value {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => out.extend_from_slice(r.to_string().as_bytes()),
        Object::Name(n) => out.extend_from_slice(name(n).as_bytes()),
        Object::String(bytes, StringFormat::Literal) => literal_string(bytes, out),
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                object(item, out)?;
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => {
            out.extend_from_slice(b"<<");
            for (key, item) in dict.iter() {
                out.push(b' ');
                out.extend_from_slice(name(key).as_bytes());
                out.push(b' ');
                object(item, out)?;
            }
            out.extend_from_slice(b" >>");
        }
        Object::Reference((number, generation)) => {
            out.extend_from_slice(format!("{number} {generation} R").as_bytes());
        }
        Object::Stream(_) => {
            return Err(SigningError::MalformedPdf(
                "stream found where a direct object was expected".into(),
            ))
        }
    }
    Ok(())
}

/// Top-level dictionary of an indirect object, one entry per line.
///
/// # Errors
/// See [`object`].
pub fn dictionary(dict: &Dictionary) -> SigningResult<Vec<u8>> {
    let mut out = b"<<".to_vec();
    for (key, value) in dict.iter() {
        out.push(b'\n');
        out.extend_from_slice(name(key).as_bytes());
        out.push(b' ');
        object(value, &mut out)?;
    }
    out.extend_from_slice(b"\n>>");
    Ok(out)
}

fn literal_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'\\' | b'(' | b')' => out.extend_from_slice(&[b'\\', b]),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x20..=0x7E => out.push(b),
            _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
        }
    }
    out.push(b')');
}

/// PDF text string: an escaped literal for printable ASCII, otherwise a
/// UTF-16BE hex string with byte order mark.
#[must_use]
pub fn text_string(value: &str) -> String {
    if value.bytes().all(|b| (0x20..0x7F).contains(&b)) {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('(');
        for c in value.chars() {
            if matches!(c, '\\' | '(' | ')') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push(')');
        out
    } else {
        let mut out = String::from("<FEFF");
        for unit in value.encode_utf16() {
            out.push_str(&format!("{unit:04X}"));
        }
        out.push('>');
        out
    }
}

/// PDF date string `(D:YYYYMMDDHHmmSS+00'00')`.
#[must_use]
pub fn date_string(at: &DateTime<Utc>) -> String {
    format!("(D:{}+00'00')", at.format("%Y%m%d%H%M%S"))
}

/// Name token, `#xx`-escaping delimiters, whitespace and non-printable bytes.
#[must_use]
pub fn name(value: &[u8]) -> String {
    let mut out = String::from("/");
    for &b in value {
        let delimiter = matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        );
        if (0x21..0x7F).contains(&b) && !delimiter {
            out.push(b as char);
        } else {
            out.push_str(&format!("#{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lopdf::dictionary;

    fn trailer(format: XrefFormat) -> TrailerFields {
        TrailerFields {
            format,
            size: 7,
            root: ObjectId::new(1, 0),
            prev: 9,
            info: None,
            id: Some(b"[<AA> <BB>]".to_vec()),
        }
    }

    #[test]
    fn literal_and_unicode_text_strings() {
        assert_eq!(text_string("Approved (final)"), "(Approved \\(final\\))");
        assert_eq!(text_string("a\\b"), "(a\\\\b)");
        assert_eq!(text_string("İzmir"), "<FEFF0130007A006D00690072>");
        assert_eq!(text_string("line\nbreak"), "<FEFF006C0069006E0065000A0062007200650061006B>");
    }

    #[test]
    fn date_format() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 8, 5, 3).unwrap();
        assert_eq!(date_string(&at), "(D:20240229080503+00'00')");
    }

    #[test]
    fn name_escaping() {
        assert_eq!(name(b"Signature1"), "/Signature1");
        assert_eq!(name(b"Adobe.PPKLite"), "/Adobe.PPKLite");
        assert_eq!(name(b"A B"), "/A#20B");
        assert_eq!(name(b"x#(y)"), "/x#23#28y#29");
    }

    #[test]
    fn objects_serialize_as_pdf_syntax() {
        let dict = dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference((2, 0)),
            "Lang" => Object::string_literal("en (US)"),
            "ID" => Object::String(vec![0x0A, 0xFF], StringFormat::Hexadecimal),
            "Box" => vec![Object::Integer(0), Object::Real(1.5), Object::Null],
            "Viewer" => dictionary! { "HideToolbar" => true },
        };
        let text = String::from_utf8(dictionary(&dict).unwrap()).unwrap();
        assert_eq!(
            text,
            "<<\n/Type /Catalog\n/Pages 2 0 R\n/Lang (en \\(US\\))\n/ID <0AFF>\n/Box [0 1.5 null]\n/Viewer << /HideToolbar true >>\n>>"
        );

        let mut out = Vec::new();
        object(&Object::string_literal(b"tab\there\n".to_vec()), &mut out).unwrap();
        assert_eq!(out, b"(tab\\011here\\n)");
    }

    #[test]
    fn xref_section_groups_contiguous_objects() {
        let original = b"%PDF-1.4\n%%EOF";
        let mut update = IncrementalUpdate::new(original);
        assert_eq!(update.position(), original.len() + 1);

        let body_at = update.add_object(ObjectId::new(1, 0), b"<< /Type /Catalog >>");
        assert_eq!(body_at, original.len() + 1 + "1 0 obj\n".len());
        update.add_object(ObjectId::new(5, 0), b"<< >>");
        update.add_object(ObjectId::new(6, 0), b"<< >>");

        let appended = update.finish(&trailer(XrefFormat::Table)).unwrap();
        let text = String::from_utf8(appended).unwrap();
        assert!(text.starts_with("\n1 0 obj\n"));
        assert!(text.contains("xref\n1 1\n0000000015 00000 n\r\n5 2\n"));
        assert!(text.contains("trailer\n<< /Size 7 /Root 1 0 R /Prev 9 /ID [<AA> <BB>] >>"));
        assert!(text.ends_with("%%EOF\n"));

        let entry_lines = text.lines().filter(|l| l.ends_with(" n\r")).count();
        assert_eq!(entry_lines, 3);
    }

    #[test]
    fn xref_stream_indexes_itself() {
        let original = b"%PDF-1.5\n%%EOF\n";
        let mut update = IncrementalUpdate::new(original);
        update.add_object(ObjectId::new(1, 0), b"<< /Type /Catalog >>");
        update.add_object(ObjectId::new(5, 0), b"<< >>");
        update.add_object(ObjectId::new(6, 0), b"<< >>");
        let stream_at = update.position();

        let appended = update.finish(&trailer(XrefFormat::Stream)).unwrap();
        let head = &appended[stream_at - original.len()..];
        let header = b"7 0 obj\n<< /Type /XRef /Size 8 /Root 1 0 R /Prev 9 /ID [<AA> <BB>] /Index [1 1 5 3] /W [1 4 2] /Length 28 >>\nstream\n";
        assert!(head.starts_with(header));
        assert!(!appended.windows(7).any(|w| w == b"trailer"));

        let rows = &head[header.len()..header.len() + 28];
        let row = |i: usize| &rows[i * 7..(i + 1) * 7];
        assert_eq!(row(0)[0], 1);
        assert_eq!(
            u32::from_be_bytes(row(0)[1..5].try_into().unwrap()) as usize,
            original.len()
        );
        assert_eq!(
            u32::from_be_bytes(row(3)[1..5].try_into().unwrap()) as usize,
            stream_at
        );
        assert_eq!(&row(3)[5..], &[0, 0]);

        let tail = String::from_utf8_lossy(&head[header.len() + 28..]).into_owned();
        assert_eq!(tail, format!("\nendstream\nendobj\nstartxref\n{stream_at}\n%%EOF\n"));
    }
}
