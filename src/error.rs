//! Error types for signing and verification.
//!
//! Construction-time failures (`InvalidRange`, `UnsupportedDocument`,
//! `KeyMismatch`, `SignatureTooLarge`) abort a signing call with no output.
//! Trust failures found during verification are not errors; they are
//! reported through [`crate::signatures::ChainVerdict`].

/// Result type alias for certseal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while signing or verifying a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Byte ranges overlap, are unsorted, or fall outside the document
    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    /// Document cannot be amended by an incremental update
    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    /// Private key does not belong to the leaf certificate
    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    /// Encoded signature does not fit the reserved placeholder
    #[error("Signature too large: {size} bytes exceed the {capacity} byte placeholder")]
    SignatureTooLarge {
        /// Size of the DER-encoded signature
        size: usize,
        /// Capacity of the placeholder in bytes
        capacity: usize,
    },

    /// Signature dictionary or embedded signature is structurally corrupt
    #[error("Malformed signature: {0}")]
    Malformed(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Algorithm not supported by this crate
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// ASN.1 encoding or decoding failure
    #[error("ASN.1 error: {0}")]
    Asn1(#[from] der::Error),

    /// Cryptographic primitive failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::Crypto(err.to_string())
    }
}

impl From<signature::Error> for Error {
    fn from(err: signature::Error) -> Self {
        Error::Crypto(err.to_string())
    }
}
