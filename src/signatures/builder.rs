//! Detached signature construction.

use super::cms::{encode_signed_data, signed_attributes};
use super::credentials::{sign_message, KeyMaterial};
use super::digest::DocumentDigest;
use super::types::{DigestAlgorithm, SignOptions, DEFAULT_MAX_SIGNATURE_SIZE};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use der::Encode;

/// A DER-encoded CMS `SignedData` blob, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    der: Vec<u8>,
    digest_algorithm: DigestAlgorithm,
    signing_time: DateTime<Utc>,
    chain_len: usize,
}

impl DetachedSignature {
    /// DER encoding.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.der.len()
    }

    /// Check if the encoding is empty.
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }

    /// Digest algorithm of the signed digest.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Time attested in the signing-time attribute.
    pub fn signing_time(&self) -> DateTime<Utc> {
        self.signing_time
    }

    /// Number of certificates carried.
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }
}

/// Builds detached signatures over document digests.
#[derive(Debug, Clone)]
pub struct SignatureBuilder {
    max_signature_size: usize,
    signing_time: Option<DateTime<Utc>>,
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIGNATURE_SIZE)
    }
}

impl SignatureBuilder {
    /// Create a builder whose output may not exceed `max_signature_size` bytes.
    pub fn new(max_signature_size: usize) -> Self {
        Self {
            max_signature_size,
            signing_time: None,
        }
    }

    /// Create a builder from signing options.
    pub fn from_options(options: &SignOptions) -> Self {
        Self {
            max_signature_size: options.max_signature_size,
            signing_time: options.signing_time,
        }
    }

    /// Use a fixed signing time instead of the wall clock.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Sign `digest` with `key`.
    ///
    /// Fails with `KeyMismatch` if the key does not belong to the leaf
    /// certificate, and with `SignatureTooLarge` if the encoded blob exceeds
    /// the configured maximum.
    pub fn sign(&self, digest: &DocumentDigest, key: &KeyMaterial) -> Result<DetachedSignature> {
        key.check_key_matches_leaf()?;

        let algorithm = digest.algorithm();
        let signing_time = self.signing_time.unwrap_or_else(Utc::now);

        let attrs = signed_attributes(digest.as_bytes(), &signing_time)?;
        let signature = sign_message(key.private_key(), algorithm, &attrs.to_der()?)?;
        let der = encode_signed_data(algorithm, key.chain(), attrs, signature)?;

        if der.len() > self.max_signature_size {
            return Err(Error::SignatureTooLarge {
                size: der.len(),
                capacity: self.max_signature_size,
            });
        }

        log::debug!(
            "built {} byte signature ({}, {} certificates)",
            der.len(),
            algorithm,
            key.chain().len()
        );

        Ok(DetachedSignature {
            der,
            digest_algorithm: algorithm,
            signing_time,
            chain_len: key.chain().len(),
        })
    }
}
