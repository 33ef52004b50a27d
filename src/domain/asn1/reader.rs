//! Strict DER reader used to inspect CMS structures and certificate fields.
//!
//! Only the subset needed here: single-byte tags, definite minimal lengths.
//! BER leniencies (indefinite lengths, padded long-form lengths) are rejected.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::{
    domain::constants::{ASN1_GENERALIZED_TIME_TAG, ASN1_OID_TAG, ASN1_UTC_TIME_TAG},
    SigningError, SigningResult,
};

/// One decoded TLV borrowing from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerElement<'a> {
    pub tag: u8,
    pub content: &'a [u8],
    /// Complete encoding: tag, length and content.
    pub raw: &'a [u8],
}

impl<'a> DerElement<'a> {
    /// Decode the content of a constructed element into its children.
    pub fn children(&self) -> SigningResult<Vec<DerElement<'a>>> {
        read_all(self.content)
    }

    pub fn expect_tag(&self, tag: u8, what: &str) -> SigningResult<()> {
        if self.tag == tag {
            Ok(())
        } else {
            Err(SigningError::EncodingError(format!(
                "{what}: expected tag 0x{tag:02X}, found 0x{:02X}",
                self.tag
            )))
        }
    }
}

/// Read one element from the front of `input`, returning it and the remainder.
pub fn read_element(input: &[u8]) -> SigningResult<(DerElement<'_>, &[u8])> {
    let tag = *input
        .first()
        .ok_or_else(|| SigningError::EncodingError("unexpected end of DER input".into()))?;
    if tag & 0x1F == 0x1F {
        return Err(SigningError::EncodingError(
            "multi-byte DER tags are not supported".into(),
        ));
    }
    let first_len = *input
        .get(1)
        .ok_or_else(|| SigningError::EncodingError("truncated DER length".into()))?;

    let (len, header_len) = if first_len < 0x80 {
        (first_len as usize, 2)
    } else if first_len == 0x80 {
        return Err(SigningError::EncodingError(
            "indefinite length is not DER".into(),
        ));
    } else {
        let count = (first_len & 0x7F) as usize;
        if count > std::mem::size_of::<usize>() {
            return Err(SigningError::EncodingError("DER length too large".into()));
        }
        let bytes = input
            .get(2..2 + count)
            .ok_or_else(|| SigningError::EncodingError("truncated DER length".into()))?;
        if bytes[0] == 0 {
            return Err(SigningError::EncodingError(
                "non-minimal DER length (leading zero)".into(),
            ));
        }
        let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        if len < 0x80 {
            return Err(SigningError::EncodingError(
                "non-minimal DER length (long form for short value)".into(),
            ));
        }
        (len, 2 + count)
    };

    let end = header_len
        .checked_add(len)
        .filter(|end| *end <= input.len())
        .ok_or_else(|| {
            SigningError::EncodingError(format!(
                "DER element overruns input (need {len} bytes)"
            ))
        })?;

    Ok((
        DerElement {
            tag,
            content: &input[header_len..end],
            raw: &input[..end],
        },
        &input[end..],
    ))
}

/// Read exactly one element; trailing bytes are an error.
pub fn read_single(input: &[u8]) -> SigningResult<DerElement<'_>> {
    let (element, rest) = read_element(input)?;
    if !rest.is_empty() {
        return Err(SigningError::EncodingError(format!(
            "{} trailing bytes after DER element",
            rest.len()
        )));
    }
    Ok(element)
}

/// Read a run of consecutive elements filling `input` completely.
pub fn read_all(mut input: &[u8]) -> SigningResult<Vec<DerElement<'_>>> {
    let mut out = Vec::new();
    while !input.is_empty() {
        let (element, rest) = read_element(input)?;
        out.push(element);
        input = rest;
    }
    Ok(out)
}

/// Render OBJECT IDENTIFIER content as dotted decimal.
pub fn oid_to_string(element: &DerElement<'_>) -> SigningResult<String> {
    element.expect_tag(ASN1_OID_TAG, "object identifier")?;
    let mut arcs: Vec<u64> = Vec::new();
    let mut value: u64 = 0;
    for (i, b) in element.content.iter().enumerate() {
        value = value
            .checked_mul(128)
            .ok_or_else(|| SigningError::EncodingError("OID arc overflow".into()))?
            | u64::from(b & 0x7F);
        if b & 0x80 == 0 {
            if arcs.is_empty() {
                let first = (value / 40).min(2);
                arcs.push(first);
                arcs.push(value - first * 40);
            } else {
                arcs.push(value);
            }
            value = 0;
        } else if i + 1 == element.content.len() {
            return Err(SigningError::EncodingError("truncated OID arc".into()));
        }
    }
    if arcs.is_empty() {
        return Err(SigningError::EncodingError("empty OID".into()));
    }
    Ok(arcs
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."))
}

/// Decode a UTCTime or GeneralizedTime element (UTC, `Z` suffix, no fractions).
pub fn parse_time(element: &DerElement<'_>) -> SigningResult<DateTime<Utc>> {
    let text = std::str::from_utf8(element.content)
        .map_err(|_| SigningError::EncodingError("time value is not ASCII".into()))?;
    let naive = match element.tag {
        ASN1_UTC_TIME_TAG => {
            let digits = text.strip_suffix('Z').ok_or_else(|| {
                SigningError::EncodingError(format!("UTCTime without Z: {text}"))
            })?;
            let yy: i32 = digits
                .get(..2)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| SigningError::EncodingError(format!("bad UTCTime: {text}")))?;
            let century = if yy >= 50 { 1900 } else { 2000 };
            let full = format!("{}{}", century + yy, &digits[2..]);
            NaiveDateTime::parse_from_str(&full, "%Y%m%d%H%M%S")
        }
        ASN1_GENERALIZED_TIME_TAG => {
            let digits = text.strip_suffix('Z').ok_or_else(|| {
                SigningError::EncodingError(format!("GeneralizedTime without Z: {text}"))
            })?;
            NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
        }
        other => {
            return Err(SigningError::EncodingError(format!(
                "expected a time value, found tag 0x{other:02X}"
            )))
        }
    }
    .map_err(|e| SigningError::EncodingError(format!("bad time value {text}: {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}
