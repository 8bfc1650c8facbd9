//! Writes a finished signature into its reserved placeholder.

use super::builder::DetachedSignature;
use super::byterange::SignaturePlaceholder;
use super::placeholder::PreparedDocument;
use crate::error::{Error, Result};

/// Embed `signature` into the placeholder window of `prepared`.
///
/// Only the bytes inside the window change. The size check is repeated
/// here, so an oversized signature is rejected even if the builder was
/// configured with a larger maximum than the placeholder holds.
pub fn embed(
    prepared: PreparedDocument,
    placeholder: &SignaturePlaceholder,
    signature: &DetachedSignature,
) -> Result<Vec<u8>> {
    if prepared.placeholder() != placeholder {
        return Err(Error::InvalidRange(format!(
            "placeholder at {} does not belong to this document (expected {})",
            placeholder.offset(),
            prepared.placeholder().offset()
        )));
    }

    let encoded = placeholder.encode(signature.as_der())?;

    let mut bytes = prepared.into_bytes();
    let window = bytes
        .get_mut(placeholder.offset()..placeholder.end())
        .ok_or_else(|| Error::InvalidRange("placeholder exceeds document bounds".to_string()))?;
    if window != placeholder.reserved_text().as_slice() {
        return Err(Error::InvalidRange("placeholder window is not empty".to_string()));
    }
    window.copy_from_slice(&encoded);

    log::debug!(
        "embedded {} byte signature into {} byte window at {}",
        signature.len(),
        placeholder.length(),
        placeholder.offset()
    );
    Ok(bytes)
}
