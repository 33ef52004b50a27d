//! PDF signing domain types.
//!
//! A document moves through three typed states: [`UnsignedPdf`] (the input),
//! [`PlaceholderPdf`] (incremental update appended, `/Contents` reserved) and
//! [`SignedPdf`] (CMS spliced into the reservation). Offsets are absolute
//! byte positions in the respective buffer.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    domain::constants::{
        BYTE_RANGE_FIELD_WIDTH, BYTE_RANGE_PLACEHOLDER, DEFAULT_RESERVED_SIGNATURE_BYTES,
        DEFAULT_SIGNATURE_FIELD_NAME,
    },
    SigningError, SigningResult,
};

pub mod parse;
pub mod writer;

/// Indirect object identifier (`n g R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    #[must_use]
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// Size of the signature reservation.
///
/// The `/Contents` hex string holds `2 * bytes` digits, so the gap from `<`
/// through `>` spans `2 * bytes + 2` file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureReservation {
    bytes: usize,
}

impl SignatureReservation {
    /// # Errors
    /// `InvalidInput` for a zero-sized reservation.
    pub fn from_bytes(bytes: usize) -> SigningResult<Self> {
        if bytes == 0 {
            return Err(SigningError::InvalidInput(
                "signature reservation must be at least one byte".into(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Reservation expressed as a hex digit count, which must be even.
    ///
    /// # Errors
    /// `InvalidInput` for an odd or zero length.
    pub fn from_hex_len(hex_len: usize) -> SigningResult<Self> {
        if hex_len % 2 != 0 {
            return Err(SigningError::InvalidInput(format!(
                "reserved hex length must be even, got {hex_len}"
            )));
        }
        Self::from_bytes(hex_len / 2)
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    #[must_use]
    pub fn hex_len(&self) -> usize {
        self.bytes * 2
    }

    /// Length of `<hex>` including both brackets.
    #[must_use]
    pub fn gap_len(&self) -> usize {
        self.hex_len() + 2
    }
}

impl Default for SignatureReservation {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_RESERVED_SIGNATURE_BYTES,
        }
    }
}

/// Optional descriptive entries written into the signature dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMetadata {
    pub field_name: String,
    pub signer_name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    /// Written as `/M`; also the default CMS signingTime.
    pub signing_time: DateTime<Utc>,
}

impl SignatureMetadata {
    #[must_use]
    pub fn new(signing_time: DateTime<Utc>) -> Self {
        Self {
            field_name: DEFAULT_SIGNATURE_FIELD_NAME.to_string(),
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
            signing_time,
        }
    }
}

/// `[gap_start, gap_end)` span of the `/Contents <...>` string, brackets included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentsGap {
    pub start: usize,
    pub end: usize,
}

impl ContentsGap {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Hex digits available between the brackets.
    #[must_use]
    pub fn hex_capacity(&self) -> usize {
        self.len().saturating_sub(2)
    }
}

/// `/ByteRange [0 gap_start gap_end tail_len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange(pub [usize; 4]);

impl ByteRange {
    #[must_use]
    pub fn covering(gap: ContentsGap, total_len: usize) -> Self {
        Self([0, gap.start, gap.end, total_len.saturating_sub(gap.end)])
    }

    #[must_use]
    pub fn gap(&self) -> ContentsGap {
        ContentsGap {
            start: self.0[0] + self.0[1],
            end: self.0[2],
        }
    }

    /// Text written over [`BYTE_RANGE_PLACEHOLDER`]: same length, space padded.
    ///
    /// # Errors
    /// `InvalidByteRange` when a value exceeds the fixed field width.
    pub fn to_fixed_width(&self) -> SigningResult<String> {
        let mut text = String::with_capacity(BYTE_RANGE_PLACEHOLDER.len());
        text.push_str("[0");
        for value in &self.0[1..] {
            let digits = value.to_string();
            if digits.len() > BYTE_RANGE_FIELD_WIDTH {
                return Err(SigningError::InvalidByteRange(format!(
                    "offset {value} does not fit the {BYTE_RANGE_FIELD_WIDTH} digit slot"
                )));
            }
            text.push(' ');
            text.push_str(&format!("{digits:<width$}", width = BYTE_RANGE_FIELD_WIDTH));
        }
        text.push(']');
        Ok(text)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {} {}]", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Input document, checked to start with a `%PDF-` header.
#[derive(Clone)]
pub struct UnsignedPdf {
    bytes: Vec<u8>,
}

impl UnsignedPdf {
    /// # Errors
    /// `MalformedPdf` when the `%PDF-` header is missing from the first 1024 bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> SigningResult<Self> {
        let head = &bytes[..bytes.len().min(1024)];
        if !head.windows(5).any(|w| w == b"%PDF-") {
            return Err(SigningError::MalformedPdf("missing %PDF- header".into()));
        }
        Ok(Self { bytes })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UnsignedPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnsignedPdf(len={})", self.bytes.len())
    }
}

/// Document with the signature objects appended and the `/Contents` gap reserved.
#[derive(Clone)]
pub struct PlaceholderPdf {
    pub(crate) bytes: Vec<u8>,
    pub(crate) gap: ContentsGap,
    /// Offset of the `[` opening the `/ByteRange` placeholder slot.
    pub(crate) byte_range_slot: usize,
    pub(crate) signature_object: ObjectId,
    pub(crate) reservation: SignatureReservation,
}

impl PlaceholderPdf {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn gap(&self) -> ContentsGap {
        self.gap
    }

    #[must_use]
    pub fn gap_start(&self) -> usize {
        self.gap.start
    }

    #[must_use]
    pub fn gap_end(&self) -> usize {
        self.gap.end
    }

    #[must_use]
    pub fn byte_range_slot(&self) -> usize {
        self.byte_range_slot
    }

    #[must_use]
    pub fn signature_object(&self) -> ObjectId {
        self.signature_object
    }

    #[must_use]
    pub fn reservation(&self) -> SignatureReservation {
        self.reservation
    }

    /// The byte range the final document will carry.
    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        ByteRange::covering(self.gap, self.bytes.len())
    }
}

impl fmt::Debug for PlaceholderPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlaceholderPdf(len={}, gap={}..{}, sig={})",
            self.bytes.len(),
            self.gap.start,
            self.gap.end,
            self.signature_object
        )
    }
}

/// Final signed document.
#[derive(Clone)]
pub struct SignedPdf {
    pub(crate) bytes: Vec<u8>,
    pub(crate) byte_range: ByteRange,
}

impl SignedPdf {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }
}

impl fmt::Debug for SignedPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedPdf(len={}, byte_range={})", self.bytes.len(), self.byte_range)
    }
}
