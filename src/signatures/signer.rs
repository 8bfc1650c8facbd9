//! PDF signing implementation.
//!
//! This module runs the signing pipeline: reserve a placeholder, digest the
//! covered ranges, build the detached signature and write it into the file.

use super::builder::SignatureBuilder;
use super::credentials::KeyMaterial;
use super::digest::digest;
use super::embed::embed;
use super::placeholder::{allocate, SignableDocument};
use super::types::SignOptions;
use crate::error::Result;
use chrono::Utc;

/// PDF signer that creates digital signatures.
#[derive(Debug, Clone, Default)]
pub struct PdfSigner {
    options: SignOptions,
}

impl PdfSigner {
    /// Create a new PDF signer with the given options.
    pub fn new(options: SignOptions) -> Self {
        Self { options }
    }

    /// Get the signing options.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Sign `document` with `key`, returning the complete signed file.
    ///
    /// The original bytes are an exact prefix of the output. On failure no
    /// partial output is produced.
    pub fn sign(&self, document: &SignableDocument, key: &KeyMaterial) -> Result<Vec<u8>> {
        // `/M` and the signing-time attribute must agree.
        let mut options = self.options.clone();
        let signing_time = *options.signing_time.get_or_insert_with(Utc::now);

        // Fail before touching the document when the key is unusable.
        key.check_key_matches_leaf()?;

        let (prepared, byte_range, placeholder) = allocate(document, &options)?;
        let document_digest = digest(&prepared, &byte_range, options.digest_algorithm)?;
        let signature = SignatureBuilder::from_options(&options)
            .with_signing_time(signing_time)
            .sign(&document_digest, key)?;

        log::debug!(
            "signing {} byte document: range {:?}, {} byte signature",
            document.len(),
            byte_range.ranges(),
            signature.len()
        );
        embed(prepared, &placeholder, &signature)
    }

    /// Sign raw document bytes.
    pub fn sign_bytes(&self, bytes: &[u8], key: &KeyMaterial) -> Result<Vec<u8>> {
        let document = SignableDocument::new(bytes.to_vec())?;
        self.sign(&document, key)
    }
}
