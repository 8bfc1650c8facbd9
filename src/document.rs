//! Read-only view of a document's object graph.
//!
//! [`PdfStructure`] resolves just enough of a rendered document (trailer,
//! catalog, first page, AcroForm) to append an incremental update that adds
//! a signature field. Objects are parsed lazily from their xref offsets.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, to_parse_error};
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable};

/// Depth limit when walking the page tree.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Parsed cross-reference information over borrowed document bytes.
#[derive(Debug)]
pub struct PdfStructure<'a> {
    data: &'a [u8],
    xref: CrossRefTable,
    startxref: u64,
}

impl<'a> PdfStructure<'a> {
    /// Parse the cross-reference chain of `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if !data.starts_with(b"%PDF-") {
            return Err(Error::UnsupportedDocument("missing %PDF- header".to_string()));
        }
        let startxref = find_xref_offset(data)?;
        let xref = parse_xref(data, startxref)?;
        log::debug!("parsed xref: {} entries, startxref {}", xref.len(), startxref);
        Ok(Self {
            data,
            xref,
            startxref,
        })
    }

    /// Offset of the newest cross-reference section.
    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    /// Trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Value of the trailer's `/Size` entry.
    pub fn size(&self) -> Result<u32> {
        self.trailer()
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|size| u32::try_from(size).ok())
            .ok_or_else(|| Error::UnsupportedDocument("trailer has no /Size".to_string()))
    }

    /// Load an indirect object through the xref table.
    pub fn load(&self, obj_ref: ObjectRef) -> Result<Object> {
        let entry = self
            .xref
            .get(obj_ref.id)
            .filter(|entry| entry.in_use)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;

        let offset = usize::try_from(entry.offset)
            .ok()
            .filter(|&o| o < self.data.len())
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;

        let input = &self.data[offset..];
        let (_, (found, obj)) =
            parse_indirect_object(input).map_err(|e| to_parse_error(input, offset, e))?;

        if found.id != obj_ref.id {
            return Err(Error::ParseError {
                offset,
                reason: format!("expected object {}, found {}", obj_ref, found),
            });
        }
        Ok(obj)
    }

    /// Follow a reference, or return a direct object unchanged.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.load(*r),
            other => Ok(other.clone()),
        }
    }

    /// Reference to the document catalog.
    pub fn root_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::UnsupportedDocument("trailer has no /Root reference".to_string()))
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<Dictionary> {
        let root = self.root_ref()?;
        self.load(root)?
            .into_dict()
            .ok_or_else(|| Error::UnsupportedDocument("catalog is not a dictionary".to_string()))
    }

    /// Reference and dictionary of the first leaf page.
    pub fn first_page(&self) -> Result<(ObjectRef, Dictionary)> {
        let catalog = self.catalog()?;
        let mut node_ref = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::UnsupportedDocument("catalog has no /Pages".to_string()))?;

        for _ in 0..MAX_PAGE_TREE_DEPTH {
            let node = self
                .load(node_ref)?
                .into_dict()
                .ok_or_else(|| {
                    Error::UnsupportedDocument("page tree node is not a dictionary".to_string())
                })?;

            match node.get("Type").and_then(Object::as_name) {
                Some("Page") => return Ok((node_ref, node)),
                _ => {
                    let kids = node.get("Kids").map(|k| self.resolve(k)).transpose()?;
                    node_ref = kids
                        .as_ref()
                        .and_then(Object::as_array)
                        .and_then(|kids| kids.first())
                        .and_then(Object::as_reference)
                        .ok_or_else(|| {
                            Error::UnsupportedDocument("document has no pages".to_string())
                        })?;
                },
            }
        }

        Err(Error::UnsupportedDocument("page tree too deep".to_string()))
    }

    /// True when any field in the AcroForm is a signature field with a value.
    pub fn has_signed_field(&self, catalog: &Dictionary) -> Result<bool> {
        let acroform = match catalog.get("AcroForm") {
            Some(obj) => self.resolve(obj)?,
            None => return Ok(false),
        };
        let fields = match acroform.as_dict().and_then(|d| d.get("Fields")) {
            Some(obj) => self.resolve(obj)?,
            None => return Ok(false),
        };

        for field in fields.as_array().map(Vec::as_slice).unwrap_or_default() {
            let field = self.resolve(field)?;
            let Some(dict) = field.as_dict() else { continue };
            let is_sig = dict.get("FT").and_then(Object::as_name) == Some("Sig");
            if is_sig && dict.get("V").is_some_and(|v| !v.is_null()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_pdf;

    #[test]
    fn test_parse_sample_structure() {
        let pdf = sample_pdf(200);
        let structure = PdfStructure::parse(&pdf).unwrap();
        assert_eq!(structure.size().unwrap(), 5);
        assert_eq!(structure.root_ref().unwrap(), ObjectRef::new(1, 0));
        let catalog = structure.catalog().unwrap();
        assert_eq!(catalog.get("Type").and_then(Object::as_name), Some("Catalog"));
    }

    #[test]
    fn test_first_page() {
        let pdf = sample_pdf(50);
        let structure = PdfStructure::parse(&pdf).unwrap();
        let (page_ref, page) = structure.first_page().unwrap();
        assert_eq!(page_ref, ObjectRef::new(3, 0));
        assert_eq!(page.get("Type").and_then(Object::as_name), Some("Page"));
    }

    #[test]
    fn test_missing_object() {
        let pdf = sample_pdf(10);
        let structure = PdfStructure::parse(&pdf).unwrap();
        let err = structure.load(ObjectRef::new(42, 0)).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound(42, 0)));
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = PdfStructure::parse(b"GIF89a").unwrap_err();
        assert!(matches!(err, Error::UnsupportedDocument(_)));
    }

    #[test]
    fn test_unsigned_document_has_no_signed_field() {
        let pdf = sample_pdf(10);
        let structure = PdfStructure::parse(&pdf).unwrap();
        let catalog = structure.catalog().unwrap();
        assert!(!structure.has_signed_field(&catalog).unwrap());
    }
}
