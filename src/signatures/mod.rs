//! PDF digital signatures.
//!
//! Signing is a strict pipeline over type-states:
//!
//! 1. [`SignableDocument`] → [`allocate`] appends an incremental update with
//!    a signature dictionary whose `/Contents` is a zero-filled placeholder,
//!    yielding a [`PreparedDocument`], its [`ByteRange`] and the
//!    [`SignaturePlaceholder`].
//! 2. [`digest`] hashes the covered ranges.
//! 3. [`SignatureBuilder::sign`] produces a detached CMS `SignedData` blob.
//! 4. [`embed`] writes the blob into the placeholder.
//!
//! [`PdfSigner`] runs all four steps. Verification recovers everything from
//! the signed file alone; see [`SignatureVerifier`] and [`verify`].
//!
//! ## Example
//!
//! ```ignore
//! use certseal::signatures::{KeyMaterial, PdfSigner, SignOptions, TrustStore};
//!
//! let key = KeyMaterial::from_pem(&key_pem, &chain_pem)?;
//! let signed = PdfSigner::new(SignOptions::default()).sign_bytes(&pdf, &key)?;
//!
//! let anchors = TrustStore::from_pem(&root_pem)?;
//! let verdict = certseal::signatures::verify(&signed, &anchors)?;
//! assert!(verdict.is_valid());
//! ```
//!
//! ## References
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax

mod builder;
mod byterange;
mod chain;
pub(crate) mod cms;
pub(crate) mod credentials;
mod digest;
mod embed;
mod placeholder;
mod signer;
pub(crate) mod types;
mod verifier;

pub use builder::{DetachedSignature, SignatureBuilder};
pub(crate) use byterange::bytes_to_hex;
pub use byterange::{ByteRange, SignaturePlaceholder, BYTE_RANGE_TEXT_LEN};
pub use chain::{
    validate, ChainReport, ChainValidator, RevocationData, RevocationStatus, TrustStore,
};
pub use cms::EmbeddedSignature;
pub use credentials::KeyMaterial;
pub use digest::{digest, DocumentDigest};
pub use embed::embed;
pub use placeholder::{allocate, PreparedDocument, SignableDocument};
pub use signer::PdfSigner;
pub use types::{
    format_pdf_date, CertificateSummary, ChainVerdict, DigestAlgorithm, SignOptions,
    SignatureInfo, SignatureSubFilter, VerificationVerdict, DEFAULT_FIELD_NAME,
    DEFAULT_MAX_SIGNATURE_SIZE,
};
pub use verifier::{
    certificate_fingerprint, format_fingerprint, verify, SignatureVerifier, VerifyOptions,
};
