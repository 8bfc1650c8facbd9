//! Digest engine.
//!
//! Hashes the bytes of each range, in order, through one streaming hasher.
//! Output depends only on the bytes and the ranges, so the verifier
//! reproduces exactly the value the signer computed.

use super::byterange::ByteRange;
use super::placeholder::PreparedDocument;
use super::types::DigestAlgorithm;
use crate::error::Result;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// A digest over a document's signed byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDigest {
    algorithm: DigestAlgorithm,
    value: Vec<u8>,
}

impl DocumentDigest {
    pub(crate) fn new(algorithm: DigestAlgorithm, value: Vec<u8>) -> Self {
        Self { algorithm, value }
    }

    /// Algorithm that produced this digest.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }
}

/// Digest `range` of a prepared document.
///
/// Fails with `InvalidRange` if the range leaves the document.
pub fn digest(
    document: &PreparedDocument,
    range: &ByteRange,
    algorithm: DigestAlgorithm,
) -> Result<DocumentDigest> {
    digest_ranges(document.as_bytes(), range, algorithm)
}

/// Digest `range` of arbitrary bytes.
pub(crate) fn digest_ranges(
    bytes: &[u8],
    range: &ByteRange,
    algorithm: DigestAlgorithm,
) -> Result<DocumentDigest> {
    range.check_bounds(bytes.len())?;

    let value = match algorithm {
        DigestAlgorithm::Sha256 => hash_ranges::<Sha256>(bytes, range),
        DigestAlgorithm::Sha384 => hash_ranges::<Sha384>(bytes, range),
        DigestAlgorithm::Sha512 => hash_ranges::<Sha512>(bytes, range),
    };

    log::debug!(
        "{} over {} bytes in {} ranges",
        algorithm,
        range.covered_len(),
        range.ranges().len()
    );
    Ok(DocumentDigest::new(algorithm, value))
}

/// Hash a plain byte string.
pub(crate) fn hash_bytes(bytes: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        DigestAlgorithm::Sha384 => Sha384::digest(bytes).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
    }
}

fn hash_ranges<D: Digest>(bytes: &[u8], range: &ByteRange) -> Vec<u8> {
    let mut hasher = D::new();
    for &(offset, length) in range.ranges() {
        hasher.update(&bytes[offset..offset + length]);
    }
    hasher.finalize().to_vec()
}
