// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::should_implement_trait)]

//! # certseal
//!
//! Incremental signing and verification of PDF documents.
//!
//! ## Signing
//!
//! A signature is added as an incremental update: the original file is left
//! byte-for-byte intact and a signature dictionary, an invisible signature
//! field and the updated catalog and page are appended with a new
//! cross-reference section. The dictionary's `/Contents` reserves a
//! fixed-size hex placeholder; the `/ByteRange` covers every byte of the
//! final file except that placeholder. The covered bytes are hashed and a
//! detached CMS `SignedData` (RFC 5652) is written into the placeholder.
//!
//! ## Verification
//!
//! Everything needed is recovered from the signed file: the byte range, the
//! CMS blob, the signer certificate and the chain. The verdict separates
//! document integrity, signature validity and chain trust, so a tampered
//! document and an untrusted signer are told apart.
//!
//! ## Quick Start
//!
//! ```ignore
//! use certseal::signatures::{verify, KeyMaterial, PdfSigner, SignOptions, TrustStore};
//!
//! # fn main() -> certseal::Result<()> {
//! let key_pem = std::fs::read_to_string("signer.key")?;
//! let key = KeyMaterial::from_pem(&key_pem, &std::fs::read("chain.pem")?)?;
//! let pdf = std::fs::read("certificate.pdf")?;
//!
//! let options = SignOptions::default().with_reason("Course completion");
//! let signed = PdfSigner::new(options).sign_bytes(&pdf, &key)?;
//!
//! let anchors = TrustStore::from_pem(&std::fs::read("root.pem")?)?;
//! let verdict = verify(&signed, &anchors)?;
//! assert!(verdict.is_valid());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod xref;

// PDF writing
pub mod writer;

// Signing and verification
pub mod signatures;
pub mod verification_code;

// Configuration
pub mod config;

#[cfg(test)]
mod testutil;

// Re-exports
pub use config::SignerConfig;
pub use error::{Error, Result};
pub use signatures::{verify, KeyMaterial, PdfSigner, SignOptions, TrustStore, VerificationVerdict};
pub use verification_code::VerificationCode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
