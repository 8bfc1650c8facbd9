//! Placeholder allocation.
//!
//! Turns a rendered [`SignableDocument`] into a [`PreparedDocument`] by
//! appending an incremental update that holds an empty signature dictionary,
//! an invisible signature field, and updated catalog and page objects. Once
//! allocated, the document length is frozen: only the `/Contents` window is
//! written afterwards.

use super::byterange::{ByteRange, SignaturePlaceholder};
use super::types::{format_pdf_date, SignOptions, SignatureSubFilter};
use crate::document::PdfStructure;
use crate::error::{Error, Result};
use crate::object::{dict, name, Dictionary, Object, ObjectRef};
use crate::writer::{encode_text_string, write_string, IncrementalUpdate};
use crate::xref::find_xref_offset;
use bytes::Bytes;
use chrono::Utc;

/// Annotation flags for an invisible signature widget: Print | Locked.
const WIDGET_FLAGS: i64 = 132;

/// `/SigFlags`: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// A rendered, unsigned document.
///
/// The bytes are immutable; signing produces a new buffer.
#[derive(Debug, Clone)]
pub struct SignableDocument {
    bytes: Bytes,
    insertion_point: usize,
}

impl SignableDocument {
    /// Wrap rendered document bytes.
    ///
    /// Fails with `UnsupportedDocument` when the bytes are not a complete
    /// PDF file (header, `startxref` pointer and `%%EOF` marker).
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if !bytes.starts_with(b"%PDF-") {
            return Err(Error::UnsupportedDocument("missing %PDF- header".to_string()));
        }
        find_xref_offset(&bytes)?;

        let tail = &bytes[bytes.len().saturating_sub(1024)..];
        if !tail.windows(5).any(|w| w == b"%%EOF") {
            return Err(Error::UnsupportedDocument("missing %%EOF marker".to_string()));
        }

        let insertion_point = bytes.len();
        Ok(Self {
            bytes,
            insertion_point,
        })
    }

    /// Document bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Document length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset at which the signature update is appended.
    pub fn insertion_point(&self) -> usize {
        self.insertion_point
    }
}

/// A document with its signature placeholder allocated.
///
/// Only a `PreparedDocument` can be digested, so the placeholder always
/// exists before any digest is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDocument {
    bytes: Vec<u8>,
    byte_range: ByteRange,
    placeholder: SignaturePlaceholder,
}

impl PreparedDocument {
    /// Document bytes, placeholder still zero-filled.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Final document length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The range written into `/ByteRange`.
    pub fn byte_range(&self) -> &ByteRange {
        &self.byte_range
    }

    /// The reserved `/Contents` window.
    pub fn placeholder(&self) -> &SignaturePlaceholder {
        &self.placeholder
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reserve a signature placeholder in `document`.
///
/// Returns the prepared document, the byte range to digest and the
/// placeholder the signature will be written into.
pub fn allocate(
    document: &SignableDocument,
    options: &SignOptions,
) -> Result<(PreparedDocument, ByteRange, SignaturePlaceholder)> {
    if options.max_signature_size == 0 {
        return Err(Error::Config("max_signature_size must be positive".to_string()));
    }

    let source = document.as_bytes();
    let structure = PdfStructure::parse(source)?;
    if structure.trailer().contains_key("Encrypt") {
        return Err(Error::UnsupportedDocument("encrypted documents cannot be signed".to_string()));
    }

    let root_ref = structure.root_ref()?;
    let mut catalog = structure.catalog()?;
    if structure.has_signed_field(&catalog)? {
        return Err(Error::UnsupportedDocument("document is already signed".to_string()));
    }
    let (page_ref, mut page) = structure.first_page()?;

    let next_id = structure.size()?;
    let sig_ref = ObjectRef::new(next_id, 0);
    let field_ref = ObjectRef::new(next_id + 1, 0);

    let mut update = IncrementalUpdate::new(source);

    let reserved = SignaturePlaceholder::new(0, options.max_signature_size);
    let sig_dict = SignatureDictionary::build(options, &reserved);
    let body_offset = update.append_raw_object(sig_ref, &sig_dict.body);

    update.append_object(field_ref, &signature_field(options, sig_ref, page_ref));

    match catalog.get("AcroForm").cloned() {
        Some(Object::Reference(acroform_ref)) => {
            let acroform = structure.load(acroform_ref)?.into_dict().ok_or_else(|| {
                Error::UnsupportedDocument("AcroForm is not a dictionary".to_string())
            })?;
            let acroform = add_field(&structure, acroform, field_ref)?;
            update.append_object(acroform_ref, &Object::Dictionary(acroform));
        },
        existing => {
            let acroform = match existing {
                Some(Object::Dictionary(d)) => d,
                _ => Dictionary::new(),
            };
            let acroform = add_field(&structure, acroform, field_ref)?;
            catalog.insert("AcroForm".to_string(), Object::Dictionary(acroform));
            update.append_object(root_ref, &Object::Dictionary(catalog));
        },
    }

    let mut annots = match page.get("Annots") {
        Some(obj) => structure
            .resolve(obj)?
            .as_array()
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    };
    annots.push(Object::Reference(field_ref));
    page.insert("Annots".to_string(), Object::Array(annots));
    update.append_object(page_ref, &Object::Dictionary(page));

    let mut trailer = Dictionary::new();
    trailer.insert("Size".to_string(), Object::Integer(i64::from(next_id) + 2));
    trailer.insert("Root".to_string(), Object::Reference(root_ref));
    for key in ["Info", "ID"] {
        if let Some(value) = structure.trailer().get(key) {
            trailer.insert(key.to_string(), value.clone());
        }
    }

    let mut bytes = update.finish(trailer, structure.startxref());

    let placeholder = SignaturePlaceholder::new(
        body_offset + sig_dict.contents_offset,
        options.max_signature_size,
    );
    let byte_range =
        ByteRange::around_gap(bytes.len(), placeholder.offset(), placeholder.length())?;

    let range_text = byte_range.to_fixed_width()?;
    let range_start = body_offset + sig_dict.byte_range_offset;
    bytes[range_start..range_start + range_text.len()].copy_from_slice(range_text.as_bytes());

    log::debug!(
        "allocated placeholder: {} byte window at {}, byte range {:?}, document {} -> {} bytes",
        placeholder.length(),
        placeholder.offset(),
        byte_range.ranges(),
        source.len(),
        bytes.len()
    );

    let prepared = PreparedDocument {
        bytes,
        byte_range: byte_range.clone(),
        placeholder,
    };
    Ok((prepared, byte_range, placeholder))
}

/// Serialized signature dictionary with the offsets of its patchable values.
struct SignatureDictionary {
    body: Vec<u8>,
    byte_range_offset: usize,
    contents_offset: usize,
}

impl SignatureDictionary {
    fn build(options: &SignOptions, placeholder: &SignaturePlaceholder) -> Self {
        let signing_time = options.signing_time.unwrap_or_else(Utc::now);

        let mut body = Vec::with_capacity(placeholder.length() + 512);
        body.extend_from_slice(b"<<\n/Type /Sig\n/Filter /Adobe.PPKLite\n/SubFilter /");
        body.extend_from_slice(SignatureSubFilter::Pkcs7Detached.as_pdf_name().as_bytes());
        body.extend_from_slice(b"\n/ByteRange ");
        let byte_range_offset = body.len();
        body.extend_from_slice(ByteRange::reserved_text().as_bytes());
        body.extend_from_slice(b"\n/Contents ");
        let contents_offset = body.len();
        body.extend_from_slice(&placeholder.reserved_text());

        body.extend_from_slice(b"\n/M ");
        write_string(&mut body, format_pdf_date(&signing_time).as_bytes());

        let entries = [
            ("Name", &options.name),
            ("Reason", &options.reason),
            ("Location", &options.location),
            ("ContactInfo", &options.contact_info),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                body.extend_from_slice(format!("\n/{} ", key).as_bytes());
                write_string(&mut body, &encode_text_string(value));
            }
        }
        body.extend_from_slice(b"\n>>");

        Self {
            body,
            byte_range_offset,
            contents_offset,
        }
    }
}

/// Invisible signature widget merged with its field.
fn signature_field(options: &SignOptions, sig_ref: ObjectRef, page_ref: ObjectRef) -> Object {
    dict(vec![
        ("FT", name("Sig")),
        ("T", Object::String(encode_text_string(&options.field_name))),
        ("V", Object::Reference(sig_ref)),
        ("Type", name("Annot")),
        ("Subtype", name("Widget")),
        ("Rect", Object::Array(vec![Object::Integer(0); 4])),
        ("F", Object::Integer(WIDGET_FLAGS)),
        ("P", Object::Reference(page_ref)),
    ])
}

/// Add `field_ref` to an AcroForm's `/Fields` and set `/SigFlags`.
fn add_field(
    structure: &PdfStructure<'_>,
    mut acroform: Dictionary,
    field_ref: ObjectRef,
) -> Result<Dictionary> {
    let mut fields = match acroform.get("Fields") {
        Some(obj) => structure
            .resolve(obj)?
            .as_array()
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    };
    fields.push(Object::Reference(field_ref));
    acroform.insert("Fields".to_string(), Object::Array(fields));
    acroform.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
    Ok(acroform)
}
