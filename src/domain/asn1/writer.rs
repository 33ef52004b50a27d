//! Minimal DER writer.
//!
//! Every helper emits definite, minimal lengths. Composite values are built
//! bottom-up from already-encoded children so that each length is computed
//! from the exact bytes that follow it.

use chrono::{DateTime, Datelike, Utc};

use crate::{
    domain::constants::{
        ASN1_CONTEXT_0_CONSTRUCTED_TAG, ASN1_GENERALIZED_TIME_TAG, ASN1_INTEGER_TAG,
        ASN1_OCTET_STRING_TAG, ASN1_SEQUENCE_TAG, ASN1_SET_TAG, ASN1_UTC_TIME_TAG,
    },
    SigningError, SigningResult,
};

/// Encode a DER length in the shortest form.
///
/// Short form for `len < 128`, otherwise `0x80 | n` followed by the `n`
/// big-endian length bytes with no leading zero byte.
#[must_use]
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let be = len.to_be_bytes();
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    let significant = &be[first..];
    let mut out = Vec::with_capacity(significant.len() + 1);
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
    out
}

/// Encode a single TLV.
#[must_use]
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = encode_length(content.len());
    let mut out = Vec::with_capacity(1 + len.len() + content.len());
    out.push(tag);
    out.extend_from_slice(&len);
    out.extend_from_slice(content);
    out
}

/// SEQUENCE over already-encoded children, in the given order.
#[must_use]
pub fn sequence(children: &[&[u8]]) -> Vec<u8> {
    tlv(ASN1_SEQUENCE_TAG, &children.concat())
}

/// SET OF with DER canonical ordering (ascending by encoded bytes).
#[must_use]
pub fn set_of(children: &[&[u8]]) -> Vec<u8> {
    tlv(ASN1_SET_TAG, &sorted_concat(children))
}

/// Concatenation of `children` in DER SET OF order, without the outer header.
#[must_use]
pub fn sorted_concat(children: &[&[u8]]) -> Vec<u8> {
    let mut ordered: Vec<&[u8]> = children.to_vec();
    ordered.sort();
    ordered.concat()
}

/// `[n]` context-specific constructed wrapper (EXPLICIT tagging, or IMPLICIT
/// re-tagging of a constructed type when `content` is the inner value's content).
#[must_use]
pub fn context_constructed(tag_number: u8, content: &[u8]) -> Vec<u8> {
    tlv(ASN1_CONTEXT_0_CONSTRUCTED_TAG | (tag_number & 0x1F), content)
}

#[must_use]
pub fn octet_string(content: &[u8]) -> Vec<u8> {
    tlv(ASN1_OCTET_STRING_TAG, content)
}

/// INTEGER from an unsigned big-endian magnitude.
///
/// Leading zero bytes are stripped, and one is re-added when the top bit is
/// set so the value stays non-negative.
#[must_use]
pub fn unsigned_integer(magnitude: &[u8]) -> Vec<u8> {
    let first = magnitude.iter().position(|b| *b != 0);
    let mut content = match first {
        Some(i) => magnitude[i..].to_vec(),
        None => vec![0],
    };
    if content[0] & 0x80 != 0 {
        content.insert(0, 0);
    }
    tlv(ASN1_INTEGER_TAG, &content)
}

/// Time value as used by X.509 and CMS: UTCTime `YYMMDDHHMMSSZ` for years
/// 1950 through 2049, GeneralizedTime `YYYYMMDDHHMMSSZ` otherwise.
#[must_use]
pub fn time(at: &DateTime<Utc>) -> Vec<u8> {
    let year = at.year();
    if (1950..2050).contains(&year) {
        tlv(
            ASN1_UTC_TIME_TAG,
            at.format("%y%m%d%H%M%SZ").to_string().as_bytes(),
        )
    } else {
        tlv(
            ASN1_GENERALIZED_TIME_TAG,
            at.format("%Y%m%d%H%M%SZ").to_string().as_bytes(),
        )
    }
}
