//! Digital signature types and data structures.

use super::byterange::ByteRange;
use chrono::{DateTime, Utc};
use der::oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};

/// Default signature field name when none is configured.
pub const DEFAULT_FIELD_NAME: &str = "Signature1";

/// Default binary capacity reserved for the CMS blob.
pub const DEFAULT_MAX_SIGNATURE_SIZE: usize = 8192;

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256 (recommended)
    #[default]
    #[serde(rename = "SHA-256", alias = "sha256")]
    Sha256,
    /// SHA-384
    #[serde(rename = "SHA-384", alias = "sha384")]
    Sha384,
    /// SHA-512
    #[serde(rename = "SHA-512", alias = "sha512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => oids::SHA256,
            DigestAlgorithm::Sha384 => oids::SHA384,
            DigestAlgorithm::Sha512 => oids::SHA512,
        }
    }

    /// OID of RSA PKCS#1 v1.5 with this digest.
    pub fn rsa_signature_oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => oids::SHA256_WITH_RSA,
            DigestAlgorithm::Sha384 => oids::SHA384_WITH_RSA,
            DigestAlgorithm::Sha512 => oids::SHA512_WITH_RSA,
        }
    }

    /// Look up a digest algorithm by its OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    /// Look up the digest implied by an RSA signature algorithm OID.
    pub fn from_rsa_signature_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.rsa_signature_oid() == *oid)
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Object identifiers used in CMS and X.509 structures.
pub(crate) mod oids {
    use der::oid::ObjectIdentifier;

    pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
    pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
    pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

    pub const RSA_ENCRYPTION: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
    pub const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

    pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
    pub const ID_SIGNED_DATA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

    pub const CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
    pub const MESSAGE_DIGEST: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
    pub const SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

    pub const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 over a SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
    /// ETSI.RFC3161 - Document timestamp
    Rfc3161,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }

    /// Whether the verifier can check signatures of this kind.
    pub fn is_detached_cms(&self) -> bool {
        matches!(self, SignatureSubFilter::Pkcs7Detached | SignatureSubFilter::CadesDetached)
    }
}

/// Options for signing a PDF.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Digest algorithm to use
    pub digest_algorithm: DigestAlgorithm,
    /// Name of the signature field
    pub field_name: String,
    /// Reason for signing
    pub reason: Option<String>,
    /// Location where the document was signed
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Name of the signer (if different from certificate CN)
    pub name: Option<String>,
    /// Binary capacity reserved for the signature blob
    pub max_signature_size: usize,
    /// Fixed signing time; the wall clock is used when absent
    pub signing_time: Option<DateTime<Utc>>,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            digest_algorithm: DigestAlgorithm::Sha256,
            field_name: DEFAULT_FIELD_NAME.to_string(),
            reason: None,
            location: None,
            contact_info: None,
            name: None,
            max_signature_size: DEFAULT_MAX_SIGNATURE_SIZE,
            signing_time: None,
        }
    }
}

impl SignOptions {
    /// Set the digest algorithm.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    /// Set the signer name written to `/Name`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the signature field name.
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Set the binary capacity of the signature placeholder.
    pub fn with_max_signature_size(mut self, size: usize) -> Self {
        self.max_signature_size = size;
        self
    }

    /// Pin the signing time (used for `/M` and the signing-time attribute).
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }
}

/// Information read from a signature dictionary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignatureInfo {
    /// Name of the signer (`/Name`)
    pub signer_name: Option<String>,
    /// Raw `/M` date string
    pub signing_date: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Raw `/ByteRange` values
    pub byte_range: Vec<i64>,
}

/// Summary of a certificate for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    /// Subject distinguished name (RFC 4514)
    pub subject: String,
    /// Issuer distinguished name (RFC 4514)
    pub issuer: String,
    /// Serial number, uppercase hex
    pub serial: String,
    /// SHA-256 fingerprint, colon-separated uppercase hex
    pub fingerprint: String,
}

/// Chain trust result.
///
/// These are verification outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainVerdict {
    /// Every link validates and a trust anchor was reached
    Trusted,
    /// The chain ends without reaching a trust anchor
    UntrustedRoot,
    /// A certificate's validity window excludes the validation time
    Expired,
    /// Caller-supplied revocation data lists a chain certificate as revoked,
    /// or does not cover one of its issuers
    RevokedUnknown,
    /// Broken linkage, bad issuer signature, or violated constraints
    Malformed,
}

impl ChainVerdict {
    /// Check if the chain is trusted.
    pub fn is_trusted(&self) -> bool {
        matches!(self, ChainVerdict::Trusted)
    }
}

impl std::fmt::Display for ChainVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ChainVerdict::Trusted => "trusted",
            ChainVerdict::UntrustedRoot => "untrusted root",
            ChainVerdict::Expired => "expired",
            ChainVerdict::RevokedUnknown => "revoked or revocation unknown",
            ChainVerdict::Malformed => "malformed",
        };
        f.write_str(text)
    }
}

/// Result of verifying a signed document.
///
/// Produced fresh per call and fully populated even when a check fails.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationVerdict {
    /// Recomputed digest equals the digest bound in the signature
    pub digest_matches: bool,
    /// Signature verifies under the signer certificate's public key
    pub signature_valid: bool,
    /// Chain trust result
    pub chain: ChainVerdict,
    /// Signing time attested in the signature
    pub signing_time: Option<DateTime<Utc>>,
    /// Digest algorithm named by the signer
    pub digest_algorithm: Option<DigestAlgorithm>,
    /// Signed byte range
    pub byte_range: Option<ByteRange>,
    /// Whether the byte range covers the whole file except the placeholder
    pub covers_whole_document: bool,
    /// Signer certificate
    pub signer: Option<CertificateSummary>,
    /// Signature dictionary entries
    pub info: SignatureInfo,
    /// Human-readable reasons for any failed check
    pub messages: Vec<String>,
}

impl VerificationVerdict {
    /// True when digest, signature and chain all check out.
    pub fn is_valid(&self) -> bool {
        self.digest_matches && self.signature_valid && self.chain.is_trusted()
    }

    /// True when `code` names the fingerprint of the certificate that
    /// actually signed.
    pub fn matches_code(&self, code: &crate::verification_code::VerificationCode) -> bool {
        self.signer
            .as_ref()
            .is_some_and(|signer| code.matches_fingerprint(&signer.fingerprint))
    }
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSSZ`).
pub fn format_pdf_date(time: &DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_digest_algorithm_names() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::Sha512.to_string(), "SHA-512");
        assert_eq!(DigestAlgorithm::Sha384.output_len(), 48);
    }

    #[test]
    fn test_digest_algorithm_oid_lookup() {
        for alg in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha384, DigestAlgorithm::Sha512] {
            assert_eq!(DigestAlgorithm::from_oid(&alg.oid()), Some(alg));
            let rsa_oid = alg.rsa_signature_oid();
            assert_eq!(DigestAlgorithm::from_rsa_signature_oid(&rsa_oid), Some(alg));
        }
        assert_eq!(DigestAlgorithm::from_oid(&oids::RSA_ENCRYPTION), None);
    }

    #[test]
    fn test_digest_algorithm_deserialize() {
        let alg: DigestAlgorithm = serde_json::from_str("\"SHA-512\"").unwrap();
        assert_eq!(alg, DigestAlgorithm::Sha512);
        let alg: DigestAlgorithm = serde_json::from_str("\"sha384\"").unwrap();
        assert_eq!(alg, DigestAlgorithm::Sha384);
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("ETSI.CAdES.detached"),
            Some(SignatureSubFilter::CadesDetached)
        );
        assert!(!SignatureSubFilter::Pkcs7Sha1.is_detached_cms());
        assert_eq!(SignatureSubFilter::from_pdf_name("x.unknown"), None);
    }

    #[test]
    fn test_sign_options_builder() {
        let opts = SignOptions::default()
            .with_reason("Course completion")
            .with_location("Online")
            .with_max_signature_size(4096);
        assert_eq!(opts.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(opts.reason.as_deref(), Some("Course completion"));
        assert_eq!(opts.location.as_deref(), Some("Online"));
        assert_eq!(opts.max_signature_size, 4096);
        assert_eq!(opts.field_name, DEFAULT_FIELD_NAME);
    }

    #[test]
    fn test_format_pdf_date() {
        let time = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(format_pdf_date(&time), "D:20250307140509Z");
    }

    #[test]
    fn test_chain_verdict_display() {
        assert!(ChainVerdict::Trusted.is_trusted());
        assert!(!ChainVerdict::Expired.is_trusted());
        assert_eq!(ChainVerdict::UntrustedRoot.to_string(), "untrusted root");
    }
}
