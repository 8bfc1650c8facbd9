//! Byte ranges and the signature placeholder.
//!
//! PDF digital signatures use a `/ByteRange` array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! For a single signature the array holds four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` opening the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! The `/ByteRange` text is reserved with fixed-width slots and patched in
//! place, so writing the final offsets never changes the file length.

use crate::error::{Error, Result};
use crate::object::Object;
use serde::Serialize;

/// Width of each numeric slot in the reserved `/ByteRange` text.
const SLOT_WIDTH: usize = 10;

/// Length of the reserved `/ByteRange` array text, brackets included.
pub const BYTE_RANGE_TEXT_LEN: usize = 4 * SLOT_WIDTH + 3 + 2;

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Ordered, non-overlapping `(offset, length)` pairs covered by a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    ranges: Vec<(usize, usize)>,
}

impl ByteRange {
    /// Create a byte range, checking order and overlap.
    pub fn new(ranges: Vec<(usize, usize)>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(Error::InvalidRange("byte range is empty".to_string()));
        }

        let mut prev_end = 0usize;
        for (i, &(offset, length)) in ranges.iter().enumerate() {
            let end = offset.checked_add(length).ok_or_else(|| {
                Error::InvalidRange(format!("range {} overflows: {} + {}", i, offset, length))
            })?;
            if i > 0 && offset < prev_end {
                return Err(Error::InvalidRange(format!(
                    "range {} starts at {} before previous range ends at {}",
                    i, offset, prev_end
                )));
            }
            prev_end = end;
        }

        Ok(Self { ranges })
    }

    /// Everything in a `total_len` document except `gap_len` bytes at `gap_start`.
    pub fn around_gap(total_len: usize, gap_start: usize, gap_len: usize) -> Result<Self> {
        let gap_end = gap_start
            .checked_add(gap_len)
            .filter(|&end| end <= total_len)
            .ok_or_else(|| {
                Error::InvalidRange(format!(
                    "gap {}+{} exceeds document length {}",
                    gap_start, gap_len, total_len
                ))
            })?;
        Self::new(vec![(0, gap_start), (gap_end, total_len - gap_end)])
    }

    /// Read a `/ByteRange` array of integer pairs.
    pub fn from_pdf_array(values: &[Object]) -> Result<Self> {
        if values.is_empty() || values.len() % 2 != 0 {
            return Err(Error::InvalidRange(format!(
                "/ByteRange needs an even number of entries, found {}",
                values.len()
            )));
        }

        let numbers = values
            .iter()
            .map(|v| {
                v.as_integer()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        Error::InvalidRange(
                            "/ByteRange entries must be non-negative integers".to_string(),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(numbers.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
    }

    /// The `(offset, length)` pairs, in order.
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    /// Flattened values as written in a `/ByteRange` array.
    pub fn to_pdf_array(&self) -> Vec<i64> {
        self.ranges
            .iter()
            .flat_map(|&(offset, length)| [offset as i64, length as i64])
            .collect()
    }

    /// Total number of covered bytes.
    pub fn covered_len(&self) -> usize {
        self.ranges.iter().map(|&(_, length)| length).sum()
    }

    /// Offset one past the last covered byte.
    pub fn end(&self) -> usize {
        self.ranges
            .last()
            .map(|&(offset, length)| offset + length)
            .unwrap_or(0)
    }

    /// Fail with `InvalidRange` when any range leaves a `len`-byte document.
    pub fn check_bounds(&self, len: usize) -> Result<()> {
        if self.end() > len {
            return Err(Error::InvalidRange(format!(
                "range ends at {} beyond document length {}",
                self.end(),
                len
            )));
        }
        Ok(())
    }

    /// The uncovered `(offset, length)` between a two-range layout.
    pub fn gap(&self) -> Option<(usize, usize)> {
        match self.ranges.as_slice() {
            [(o1, l1), (o2, _)] => Some((o1 + l1, o2 - (o1 + l1))),
            _ => None,
        }
    }

    /// True when the ranges start at 0, end at `total_len`, and leave exactly
    /// one gap.
    pub fn covers_all_but_gap(&self, total_len: usize) -> bool {
        matches!(self.ranges.as_slice(), [(0, _), _]) && self.end() == total_len
    }

    /// Render a two-range layout into the reserved fixed-width text.
    ///
    /// The result always has [`BYTE_RANGE_TEXT_LEN`] bytes: values are
    /// written normally and the text is padded with spaces before `]`.
    pub fn to_fixed_width(&self) -> Result<String> {
        let values = self.to_pdf_array();
        if values.len() != 4 {
            return Err(Error::InvalidRange(format!(
                "expected two ranges for a signature, found {}",
                self.ranges.len()
            )));
        }
        if let Some(wide) = values.iter().find(|v| v.to_string().len() > SLOT_WIDTH) {
            return Err(Error::InvalidRange(format!(
                "offset {} does not fit the reserved /ByteRange slot",
                wide
            )));
        }

        let mut text = format!("[{} {} {} {}", values[0], values[1], values[2], values[3]);
        while text.len() < BYTE_RANGE_TEXT_LEN - 1 {
            text.push(' ');
        }
        text.push(']');
        Ok(text)
    }

    /// Reserved text written before final offsets are known.
    pub fn reserved_text() -> String {
        let mut text = String::from("[0 0 0 0");
        while text.len() < BYTE_RANGE_TEXT_LEN - 1 {
            text.push(' ');
        }
        text.push(']');
        text
    }
}

/// Fixed window reserved in the document for the hex-encoded signature.
///
/// The window spans the whole `/Contents` string, angle brackets included:
/// `length` is `2 * capacity + 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignaturePlaceholder {
    offset: usize,
    length: usize,
}

impl SignaturePlaceholder {
    /// Placeholder for `capacity` signature bytes starting at `offset`.
    pub fn new(offset: usize, capacity: usize) -> Self {
        Self {
            offset,
            length: capacity * 2 + 2,
        }
    }

    /// Offset of the opening `<`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the window in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Offset one past the closing `>`.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Maximum number of signature bytes the window can hold.
    pub fn capacity(&self) -> usize {
        self.length.saturating_sub(2) / 2
    }

    /// Zero-filled placeholder text: `<000...000>`.
    pub fn reserved_text(&self) -> Vec<u8> {
        let mut text = Vec::with_capacity(self.length);
        text.push(b'<');
        text.resize(self.length - 1, b'0');
        text.push(b'>');
        text
    }

    /// Encode `signature` into the window: uppercase hex, right-padded with `0`.
    pub fn encode(&self, signature: &[u8]) -> Result<Vec<u8>> {
        if signature.len() > self.capacity() {
            return Err(Error::SignatureTooLarge {
                size: signature.len(),
                capacity: self.capacity(),
            });
        }

        let mut text = Vec::with_capacity(self.length);
        text.push(b'<');
        text.extend_from_slice(bytes_to_hex(signature).as_bytes());
        text.resize(self.length - 1, b'0');
        text.push(b'>');
        Ok(text)
    }
}

/// Uppercase hex encoding.
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}
