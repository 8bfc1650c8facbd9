//! Incremental update writer.
//!
//! Appends new and replacement objects after the original bytes, followed by
//! a cross-reference section, a trailer chained to the previous section via
//! `/Prev`, and a fresh `startxref`/`%%EOF`. The original bytes are never
//! touched, so they remain a byte-identical prefix of the output.

use super::object_serializer::ObjectSerializer;
use crate::object::{Dictionary, Object, ObjectRef};

/// Builder for one incremental update section.
#[derive(Debug)]
pub struct IncrementalUpdate {
    buf: Vec<u8>,
    base_len: usize,
    entries: Vec<(ObjectRef, usize)>,
    serializer: ObjectSerializer,
}

impl IncrementalUpdate {
    /// Start an update on top of `original`.
    ///
    /// A line feed is added first when the original does not end with an
    /// end-of-line marker, so the first appended object starts on its own line.
    pub fn new(original: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(original.len() + 4096);
        buf.extend_from_slice(original);
        if !matches!(original.last(), Some(b'\n') | Some(b'\r')) {
            buf.push(b'\n');
        }
        Self {
            buf,
            base_len: original.len(),
            entries: Vec::new(),
            serializer: ObjectSerializer::new(),
        }
    }

    /// Length of the original document.
    pub fn base_len(&self) -> usize {
        self.base_len
    }

    /// Current write position (absolute offset in the output).
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Append an indirect object.
    pub fn append_object(&mut self, obj_ref: ObjectRef, obj: &Object) {
        let offset = self.buf.len();
        let bytes = self.serializer.serialize_indirect(obj_ref.id, obj_ref.gen, obj);
        self.buf.extend_from_slice(&bytes);
        self.entries.push((obj_ref, offset));
    }

    /// Append an indirect object whose body is already serialized.
    ///
    /// Returns the absolute offset at which `body` starts, so the caller can
    /// locate fields inside it in the final output.
    pub fn append_raw_object(&mut self, obj_ref: ObjectRef, body: &[u8]) -> usize {
        let offset = self.buf.len();
        self.buf
            .extend_from_slice(format!("{} {} obj\n", obj_ref.id, obj_ref.gen).as_bytes());
        let body_offset = self.buf.len();
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        self.entries.push((obj_ref, offset));
        body_offset
    }

    /// Write the cross-reference section and trailer, returning the full file.
    ///
    /// `trailer` supplies `/Root`, `/Info`, `/ID` and `/Size`; `/Prev` is set
    /// to `prev_startxref`, and `/Size` is raised if an appended object id
    /// would not fit under it.
    pub fn finish(mut self, mut trailer: Dictionary, prev_startxref: u64) -> Vec<u8> {
        let xref_offset = self.buf.len();
        self.entries.sort_by_key(|(obj_ref, _)| obj_ref.id);

        self.buf.extend_from_slice(b"xref\n");
        // One subsection per object keeps the table valid for sparse ids.
        for (obj_ref, offset) in &self.entries {
            self.buf.extend_from_slice(
                format!("{} 1\n{:010} {:05} n \n", obj_ref.id, offset, obj_ref.gen).as_bytes(),
            );
        }

        let max_id = self.entries.iter().map(|(r, _)| r.id).max().unwrap_or(0);
        let size = trailer
            .get("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0)
            .max(i64::from(max_id) + 1);
        trailer.insert("Size".to_string(), Object::Integer(size));
        trailer.insert("Prev".to_string(), Object::Integer(prev_startxref as i64));

        self.buf.extend_from_slice(b"trailer\n");
        let trailer_bytes = self.serializer.serialize(&Object::Dictionary(trailer));
        self.buf.extend_from_slice(&trailer_bytes);
        self.buf
            .extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        log::debug!(
            "incremental update: {} objects, {} bytes appended",
            self.entries.len(),
            self.buf.len() - self.base_len
        );
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{dict, name, reference};
    use crate::xref::{find_xref_offset, parse_xref};

    const BASE: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n45\n%%EOF\n";

    fn base_trailer() -> Dictionary {
        let mut trailer = Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(2));
        trailer.insert("Root".to_string(), reference(1, 0));
        trailer
    }

    #[test]
    fn test_original_is_prefix() {
        let mut update = IncrementalUpdate::new(BASE);
        update.append_object(ObjectRef::new(2, 0), &dict(vec![("Type", name("Sig"))]));
        let out = update.finish(base_trailer(), 45);
        assert!(out.starts_with(BASE));
        assert!(out.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn test_missing_final_newline_is_added() {
        let base = &BASE[..BASE.len() - 1];
        let update = IncrementalUpdate::new(base);
        assert_eq!(update.base_len(), base.len());
        assert_eq!(update.offset(), base.len() + 1);
    }

    #[test]
    fn test_updated_xref_chain_parses() {
        let mut update = IncrementalUpdate::new(BASE);
        update.append_object(
            ObjectRef::new(1, 0),
            &dict(vec![("Type", name("Catalog")), ("Updated", Object::Boolean(true))]),
        );
        let sig_offset = update.append_raw_object(ObjectRef::new(2, 0), b"<< /Type /Sig >>");
        let out = update.finish(base_trailer(), 45);

        assert_eq!(&out[sig_offset..sig_offset + 2], b"<<");
        let table = parse_xref(&out, find_xref_offset(&out).unwrap()).unwrap();
        assert_eq!(table.trailer().get("Prev").and_then(Object::as_integer), Some(45));
        assert_eq!(table.trailer().get("Size").and_then(Object::as_integer), Some(3));
        assert!(table.get(1).unwrap().offset > 45);
        assert_eq!(table.get(0).map(|e| e.in_use), Some(false));
    }

    #[test]
    fn test_xref_entries_are_fixed_width() {
        let mut update = IncrementalUpdate::new(BASE);
        update.append_object(ObjectRef::new(5, 0), &Object::Null);
        let offset = BASE.len();
        let out = update.finish(base_trailer(), 45);
        let text = String::from_utf8_lossy(&out[BASE.len()..]).into_owned();
        assert!(text.contains(&format!("5 1\n{:010} 00000 n \n", offset)));
        assert!(text.contains("/Size 6"));
    }
}
