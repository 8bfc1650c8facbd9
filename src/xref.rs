//! Cross-reference table reader.
//!
//! Maps object numbers to byte offsets so that the catalog, page tree and
//! AcroForm of a rendered document can be resolved before an incremental
//! update is appended. Only classic `xref` tables are read; a
//! cross-reference stream (PDF 1.5+) at any point of the `/Prev` chain
//! makes the document unsupported.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_object, to_parse_error};
use std::collections::HashMap;

/// Maximum length of a `/Prev` chain before it is treated as a loop.
const MAX_PREV_CHAIN: usize = 100;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Byte offset of the object (or next free object number)
    pub offset: u64,
    /// Generation number
    pub generation: u16,
    /// Whether the object is in use
    pub in_use: bool,
}

/// Cross-reference table merged across all incremental sections.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Trailer of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Number of entries across all sections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an older section; entries already present win.
    fn merge_older(&mut self, older: CrossRefTable) {
        for (obj_num, entry) in older.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
    }
}

/// Find the byte offset recorded after the last `startxref` keyword.
///
/// Only the last 2 KB of the file are searched.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let keyword = b"startxref";

    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| Error::UnsupportedDocument("missing startxref".to_string()))?;

    match token(&tail[pos + keyword.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as u64),
        _ => Err(Error::UnsupportedDocument("unreadable startxref offset".to_string())),
    }
}

/// Parse the cross-reference chain starting at `offset`, following `/Prev`.
pub fn parse_xref(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let mut table: Option<CrossRefTable> = None;
    let mut next = Some(offset);
    let mut visited = Vec::new();

    while let Some(offset) = next {
        if visited.contains(&offset) || visited.len() >= MAX_PREV_CHAIN {
            return Err(Error::UnsupportedDocument("cyclic /Prev chain".to_string()));
        }
        visited.push(offset);

        let section = parse_section(data, offset)?;
        next = section
            .trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .and_then(|prev| u64::try_from(prev).ok());

        log::debug!(
            "xref section at {} with {} entries (prev: {:?})",
            offset,
            section.entries.len(),
            next
        );

        match table.as_mut() {
            Some(newer) => newer.merge_older(section),
            None => table = Some(section),
        }
    }

    table.ok_or_else(|| Error::UnsupportedDocument("empty cross-reference chain".to_string()))
}

/// Parse one classic xref section and the trailer that follows it.
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
fn parse_section(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&o| o < data.len())
        .ok_or_else(|| {
            Error::UnsupportedDocument(format!("xref offset {} out of bounds", offset))
        })?;
    let section = &data[start..];
    let err = |e| to_parse_error(section, start, e);

    let mut input = match token(section) {
        Ok((rest, Token::Keyword(b"xref"))) => rest,
        Ok((_, Token::Integer(_))) => {
            return Err(Error::UnsupportedDocument(
                "cross-reference streams are not supported".to_string(),
            ))
        },
        _ => {
            return Err(Error::UnsupportedDocument(format!(
                "no xref table at offset {}",
                offset
            )))
        },
    };

    let mut table = CrossRefTable::default();
    loop {
        let (rest, tok) = token(input).map_err(err)?;
        let first = match tok {
            Token::Keyword(b"trailer") => {
                let (_, trailer) = parse_object(rest).map_err(err)?;
                table.trailer = trailer.into_dict().ok_or_else(|| {
                    Error::UnsupportedDocument("trailer is not a dictionary".to_string())
                })?;
                return Ok(table);
            },
            Token::Integer(first) => first,
            _ => return Err(Error::UnsupportedDocument("malformed xref subsection".to_string())),
        };

        let (rest, count) = match token(rest).map_err(err)? {
            (rest, Token::Integer(count)) => (rest, count),
            _ => return Err(Error::UnsupportedDocument("malformed xref subsection".to_string())),
        };
        input = rest;

        for i in 0..count {
            let (rest, entry) = parse_entry(input).ok_or_else(|| {
                Error::UnsupportedDocument(format!("malformed xref entry {}", first + i))
            })?;
            let obj_num = u32::try_from(first + i)
                .map_err(|_| {
                    Error::UnsupportedDocument("xref object number overflow".to_string())
                })?;
            table.entries.insert(obj_num, entry);
            input = rest;
        }
    }
}

fn parse_entry(input: &[u8]) -> Option<(&[u8], XRefEntry)> {
    let (rest, offset) = match token(input).ok()? {
        (rest, Token::Integer(v)) => (rest, u64::try_from(v).ok()?),
        _ => return None,
    };
    let (rest, generation) = match token(rest).ok()? {
        (rest, Token::Integer(v)) => (rest, u16::try_from(v).ok()?),
        _ => return None,
    };
    let (rest, in_use) = match token(rest).ok()? {
        (rest, Token::Keyword(b"n")) => (rest, true),
        (rest, Token::Keyword(b"f")) => (rest, false),
        _ => return None,
    };
    Some((
        rest,
        XRefEntry {
            offset,
            generation,
            in_use,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n45\n%%EOF\n";

    #[test]
    fn test_find_xref_offset() {
        assert_eq!(find_xref_offset(SIMPLE).unwrap(), 45);
    }

    #[test]
    fn test_missing_startxref() {
        let err = find_xref_offset(b"%PDF-1.4\nno pointer here").unwrap_err();
        assert!(matches!(err, Error::UnsupportedDocument(_)));
    }

    #[test]
    fn test_parse_simple_table() {
        let offset = find_xref_offset(SIMPLE).unwrap();
        let table = parse_xref(SIMPLE, offset).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).map(|e| e.offset), Some(9));
        assert!(!table.get(0).unwrap().in_use);
        assert_eq!(table.trailer().get("Size").and_then(Object::as_integer), Some(2));
    }

    #[test]
    fn test_xref_stream_is_unsupported() {
        let data = b"%PDF-1.5\n7 0 obj\n<< /Type /XRef >>\nstream\nendstream\nendobj\n";
        let err = parse_xref(data, 9).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDocument(_)));
    }

    #[test]
    fn test_prev_chain_newer_entries_win() {
        let mut data = SIMPLE.to_vec();
        let update_obj = data.len();
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Updated true >>\nendobj\n");
        let update_xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 1\n{:010} 00000 n \n\
                 trailer\n<< /Size 2 /Root 1 0 R /Prev 45 >>\nstartxref\n{}\n%%EOF\n",
                update_obj, update_xref
            )
            .as_bytes(),
        );

        let table = parse_xref(&data, find_xref_offset(&data).unwrap()).unwrap();
        assert_eq!(table.get(1).map(|e| e.offset), Some(update_obj as u64));
        assert!(table.get(0).is_some());
        assert_eq!(table.trailer().get("Prev").and_then(Object::as_integer), Some(45));
    }

    #[test]
    fn test_cyclic_prev_is_rejected() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        let err = parse_xref(data, 0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDocument(_)));
    }
}
