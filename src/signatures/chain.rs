//! Certificate chain validation.
//!
//! The chain is walked iteratively from the leaf towards a trust anchor,
//! carrying the current certificate and its position. Every link checks:
//!
//! - validity window (inclusive) contains the validation time
//! - issuer name of the child equals subject name of the parent
//! - the parent's key verifies the child's signature over its TBS bytes
//! - the parent is a CA (`basicConstraints cA`) within its `pathLenConstraint`
//!
//! Failures are verdicts, not errors. When several apply, the most severe
//! wins: `Malformed` > `Expired` > `RevokedUnknown` > `UntrustedRoot`.

use super::credentials::{rsa_public_key, verify_message};
use super::types::{oids, ChainVerdict, DigestAlgorithm};
use crate::error::Result;
use chrono::{DateTime, Utc};
use der::{Decode, DecodePem, Encode};
use x509_cert::ext::pkix::BasicConstraints;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

/// Upper bound on chain length.
const MAX_CHAIN_DEPTH: usize = 16;

/// Certificates accepted as trust anchors.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    anchors: Vec<Certificate>,
}

impl TrustStore {
    /// Create an empty trust store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trust store from certificates.
    pub fn from_certificates(anchors: Vec<Certificate>) -> Self {
        Self { anchors }
    }

    /// Load every certificate in a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Ok(Self {
            anchors: Certificate::load_pem_chain(pem)?,
        })
    }

    /// Add a trust anchor.
    pub fn add(&mut self, anchor: Certificate) {
        self.anchors.push(anchor);
    }

    /// Add a DER-encoded trust anchor.
    pub fn add_der(&mut self, der: &[u8]) -> Result<()> {
        self.anchors.push(Certificate::from_der(der)?);
        Ok(())
    }

    /// Add a PEM-encoded trust anchor.
    pub fn add_pem(&mut self, pem: &str) -> Result<()> {
        self.anchors.push(Certificate::from_pem(pem)?);
        Ok(())
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// The anchors.
    pub fn anchors(&self) -> &[Certificate] {
        &self.anchors
    }

    /// Whether `cert` is an anchor: same encoding, or same subject and key.
    pub fn contains(&self, cert: &Certificate) -> bool {
        let tbs = &cert.tbs_certificate;
        self.anchors.iter().any(|anchor| {
            let anchor_tbs = &anchor.tbs_certificate;
            anchor == cert
                || (anchor_tbs.subject == tbs.subject
                    && anchor_tbs.subject_public_key_info == tbs.subject_public_key_info)
        })
    }
}

/// Revocation status of one certificate against caller-supplied data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Issuer covered and certificate not listed
    Good,
    /// Certificate listed as revoked
    Revoked,
    /// The data does not cover the certificate's issuer
    Unknown,
}

/// Revocation information supplied by the caller.
///
/// Nothing is fetched; the data lists which issuers it speaks for and which
/// serial numbers those issuers revoked.
#[derive(Debug, Clone, Default)]
pub struct RevocationData {
    covered_issuers: Vec<Name>,
    revoked: Vec<(Name, SerialNumber)>,
}

impl RevocationData {
    /// Create empty revocation data (covers nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that the data is complete for certificates issued by `issuer`.
    pub fn covering(mut self, issuer: &Certificate) -> Self {
        self.covered_issuers.push(issuer.tbs_certificate.subject.clone());
        self
    }

    /// List `cert` as revoked (its issuer becomes covered).
    pub fn with_revoked(mut self, cert: &Certificate) -> Self {
        let issuer = cert.tbs_certificate.issuer.clone();
        if !self.covered_issuers.contains(&issuer) {
            self.covered_issuers.push(issuer.clone());
        }
        self.revoked.push((issuer, cert.tbs_certificate.serial_number.clone()));
        self
    }

    /// Status of `cert`.
    pub fn status(&self, cert: &Certificate) -> RevocationStatus {
        let tbs = &cert.tbs_certificate;
        if !self.covered_issuers.contains(&tbs.issuer) {
            return RevocationStatus::Unknown;
        }
        let listed = self
            .revoked
            .iter()
            .any(|(issuer, serial)| *issuer == tbs.issuer && *serial == tbs.serial_number);
        if listed {
            RevocationStatus::Revoked
        } else {
            RevocationStatus::Good
        }
    }
}

/// Outcome of a chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// The verdict
    pub verdict: ChainVerdict,
    /// Why the verdict is not `Trusted`
    pub detail: Option<String>,
    /// Certificates walked, leaf included
    pub depth: usize,
}

/// Validates certificate chains against a trust store.
#[derive(Debug, Clone, Copy)]
pub struct ChainValidator<'a> {
    anchors: &'a TrustStore,
    revocation: Option<&'a RevocationData>,
}

impl<'a> ChainValidator<'a> {
    /// Create a validator for `anchors`, without revocation checking.
    pub fn new(anchors: &'a TrustStore) -> Self {
        Self {
            anchors,
            revocation: None,
        }
    }

    /// Check revocation against caller-supplied data.
    pub fn with_revocation(mut self, revocation: Option<&'a RevocationData>) -> Self {
        self.revocation = revocation;
        self
    }

    /// Validate `chain` (leaf first) at `at_time`.
    pub fn validate(&self, chain: &[Certificate], at_time: DateTime<Utc>) -> ChainVerdict {
        match chain.first() {
            Some(leaf) => self.validate_from(leaf, chain, at_time).verdict,
            None => ChainVerdict::Malformed,
        }
    }

    /// Walk from `leaf` through `pool` (any order) towards an anchor.
    pub fn validate_from(
        &self,
        leaf: &Certificate,
        pool: &[Certificate],
        at_time: DateTime<Utc>,
    ) -> ChainReport {
        let mut worst: Option<(ChainVerdict, String)> = None;

        let mut current = leaf;
        let mut position = 0usize;

        loop {
            let subject = current.tbs_certificate.subject.to_string();
            position += 1;
            if position > MAX_CHAIN_DEPTH {
                let detail = Some("chain too long".to_string());
                return report(ChainVerdict::Malformed, detail, position);
            }

            if !within_validity(current, at_time) {
                let detail = format!("{} is not valid at {}", subject, at_time);
                note(&mut worst, ChainVerdict::Expired, detail);
            }

            if self.anchors.contains(current) {
                log::debug!("chain reached anchor {} at depth {}", subject, position);
                return finish(worst, position);
            }

            if let Some(revocation) = self.revocation {
                match revocation.status(current) {
                    RevocationStatus::Good => {},
                    RevocationStatus::Revoked => note(
                        &mut worst,
                        ChainVerdict::RevokedUnknown,
                        format!("{} is revoked", subject),
                    ),
                    RevocationStatus::Unknown => note(
                        &mut worst,
                        ChainVerdict::RevokedUnknown,
                        format!("no revocation data for the issuer of {}", subject),
                    ),
                }
            }

            if current.tbs_certificate.signature != current.signature_algorithm {
                return report(
                    ChainVerdict::Malformed,
                    Some(format!("{} has mismatched signature algorithms", subject)),
                    position,
                );
            }

            if current.tbs_certificate.issuer == current.tbs_certificate.subject {
                if !issued_by(current, current) {
                    return report(
                        ChainVerdict::Malformed,
                        Some(format!("self-signature of {} does not verify", subject)),
                        position,
                    );
                }
                let detail = format!("root {} is not a trust anchor", subject);
                note(&mut worst, ChainVerdict::UntrustedRoot, detail);
                return finish(worst, position);
            }

            let candidates: Vec<&Certificate> = pool
                .iter()
                .chain(self.anchors.anchors())
                .filter(|c| c.tbs_certificate.subject == current.tbs_certificate.issuer)
                .collect();

            if candidates.is_empty() {
                note(
                    &mut worst,
                    ChainVerdict::UntrustedRoot,
                    format!("issuer {} of {} not found", current.tbs_certificate.issuer, subject),
                );
                return finish(worst, position);
            }

            let Some(issuer) = candidates.into_iter().find(|c| issued_by(current, c)) else {
                return report(
                    ChainVerdict::Malformed,
                    Some(format!("signature on {} does not verify under its issuer", subject)),
                    position,
                );
            };

            if let Err(detail) = check_ca(issuer, position - 1, self.anchors.contains(issuer)) {
                return report(ChainVerdict::Malformed, Some(detail), position);
            }

            current = issuer;
        }
    }
}

/// Validate `chain` (leaf first) against `anchors` at `at_time`, without
/// revocation checking.
pub fn validate(
    chain: &[Certificate],
    anchors: &TrustStore,
    at_time: DateTime<Utc>,
) -> ChainVerdict {
    ChainValidator::new(anchors).validate(chain, at_time)
}

fn severity(verdict: ChainVerdict) -> u8 {
    match verdict {
        ChainVerdict::Trusted => 0,
        ChainVerdict::UntrustedRoot => 1,
        ChainVerdict::RevokedUnknown => 2,
        ChainVerdict::Expired => 3,
        ChainVerdict::Malformed => 4,
    }
}

/// Keep the more severe of the recorded and the new failure.
fn note(worst: &mut Option<(ChainVerdict, String)>, verdict: ChainVerdict, detail: String) {
    if worst.as_ref().map_or(true, |(w, _)| severity(verdict) > severity(*w)) {
        *worst = Some((verdict, detail));
    }
}

fn report(verdict: ChainVerdict, detail: Option<String>, depth: usize) -> ChainReport {
    ChainReport {
        verdict,
        detail,
        depth,
    }
}

fn finish(worst: Option<(ChainVerdict, String)>, depth: usize) -> ChainReport {
    match worst {
        Some((verdict, detail)) => report(verdict, Some(detail), depth),
        None => report(ChainVerdict::Trusted, None, depth),
    }
}

/// Whether `at_time` lies inside the certificate's validity window, bounds included.
fn within_validity(cert: &Certificate, at_time: DateTime<Utc>) -> bool {
    let validity = &cert.tbs_certificate.validity;
    let not_before = validity.not_before.to_unix_duration().as_secs();
    let not_after = validity.not_after.to_unix_duration().as_secs();
    let at = at_time.timestamp();
    match (i64::try_from(not_before), i64::try_from(not_after)) {
        (Ok(nb), Ok(na)) => nb <= at && at <= na,
        _ => false,
    }
}

/// Whether `issuer`'s RSA key verifies the signature on `cert`.
fn issued_by(cert: &Certificate, issuer: &Certificate) -> bool {
    let Some(algorithm) = DigestAlgorithm::from_rsa_signature_oid(&cert.signature_algorithm.oid)
    else {
        return false;
    };
    let Some(key) = rsa_public_key(&issuer.tbs_certificate.subject_public_key_info) else {
        return false;
    };
    let (Ok(tbs), Some(signature)) = (cert.tbs_certificate.to_der(), cert.signature.as_bytes())
    else {
        return false;
    };
    verify_message(&key, algorithm, &tbs, signature)
}

/// Check that `issuer` may issue a certificate with `intermediates_below`
/// non-leaf certificates under it.
fn check_ca(
    issuer: &Certificate,
    intermediates_below: usize,
    is_anchor: bool,
) -> std::result::Result<(), String> {
    let subject = issuer.tbs_certificate.subject.to_string();
    let extension = issuer
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == oids::BASIC_CONSTRAINTS);

    let constraints = match extension {
        Some(ext) => BasicConstraints::from_der(ext.extn_value.as_bytes())
            .map_err(|e| format!("unreadable basicConstraints on {}: {}", subject, e))?,
        None if is_anchor => return Ok(()),
        None => return Err(format!("{} is not a CA certificate", subject)),
    };

    if !constraints.ca {
        return Err(format!("{} is not a CA certificate", subject));
    }
    if let Some(path_len) = constraints.path_len_constraint {
        if intermediates_below > usize::from(path_len) {
            return Err(format!("path length constraint of {} exceeded", subject));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{issue_cert, rsa_key, CertSpec};
    use chrono::{Duration, TimeZone};

    struct Pki {
        root: Certificate,
        leaf: Certificate,
    }

    fn pki() -> Pki {
        let root = issue_cert(&CertSpec::root("CN=Chain Root"), &rsa_key(1), &rsa_key(1));
        let leaf_spec = CertSpec::leaf("CN=Chain Leaf", "CN=Chain Root");
        let leaf = issue_cert(&leaf_spec, &rsa_key(0), &rsa_key(1));
        Pki { root, leaf }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_trusted_chain() {
        let pki = pki();
        let anchors = TrustStore::from_certificates(vec![pki.root.clone()]);
        let verdict = validate(&[pki.leaf.clone(), pki.root.clone()], &anchors, now());
        assert_eq!(verdict, ChainVerdict::Trusted);
    }

    #[test]
    fn test_anchor_may_be_omitted_from_chain() {
        let pki = pki();
        let anchors = TrustStore::from_certificates(vec![pki.root.clone()]);
        assert_eq!(validate(&[pki.leaf], &anchors, now()), ChainVerdict::Trusted);
    }

    #[test]
    fn test_unordered_pool() {
        let pki = pki();
        let anchors = TrustStore::from_certificates(vec![pki.root.clone()]);
        let pool = vec![pki.root.clone(), pki.leaf.clone()];
        let report = ChainValidator::new(&anchors).validate_from(&pki.leaf, &pool, now());
        assert_eq!(report.verdict, ChainVerdict::Trusted);
        assert_eq!(report.depth, 2);
    }

    #[test]
    fn test_untrusted_root() {
        let pki = pki();
        let other = issue_cert(&CertSpec::root("CN=Other Root"), &rsa_key(2), &rsa_key(2));
        let anchors = TrustStore::from_certificates(vec![other]);
        let verdict = validate(&[pki.leaf, pki.root], &anchors, now());
        assert_eq!(verdict, ChainVerdict::UntrustedRoot);
    }

    #[test]
    fn test_missing_issuer_is_untrusted() {
        let pki = pki();
        let verdict = validate(&[pki.leaf], &TrustStore::new(), now());
        assert_eq!(verdict, ChainVerdict::UntrustedRoot);
    }

    #[test]
    fn test_validity_boundaries_are_inclusive() {
        let pki = pki();
        let anchors = TrustStore::from_certificates(vec![pki.root.clone()]);
        let not_after = CertSpec::root("x").not_after;
        let chain = [pki.leaf, pki.root];
        assert_eq!(validate(&chain, &anchors, not_after), ChainVerdict::Trusted);
        assert_eq!(
            validate(&chain, &anchors, not_after + Duration::seconds(1)),
            ChainVerdict::Expired
        );
    }

    #[test]
    fn test_issuer_signature_mismatch_is_malformed() {
        let pki = pki();
        // Same issuer name, signed by a different key.
        let forged_spec = CertSpec::leaf("CN=Chain Leaf", "CN=Chain Root");
        let forged = issue_cert(&forged_spec, &rsa_key(0), &rsa_key(2));
        let anchors = TrustStore::from_certificates(vec![pki.root.clone()]);
        assert_eq!(validate(&[forged, pki.root], &anchors, now()), ChainVerdict::Malformed);
    }

    #[test]
    fn test_non_ca_issuer_is_malformed() {
        let root = issue_cert(&CertSpec::root("CN=Chain Root"), &rsa_key(1), &rsa_key(1));
        let mid_spec = CertSpec::leaf("CN=Not A CA", "CN=Chain Root");
        let mid = issue_cert(&mid_spec, &rsa_key(2), &rsa_key(1));
        let leaf = issue_cert(&CertSpec::leaf("CN=Leaf", "CN=Not A CA"), &rsa_key(0), &rsa_key(2));
        let anchors = TrustStore::from_certificates(vec![root.clone()]);
        assert_eq!(validate(&[leaf, mid, root], &anchors, now()), ChainVerdict::Malformed);
    }

    #[test]
    fn test_path_length_constraint() {
        let root_spec = CertSpec {
            ca: Some(Some(0)),
            ..CertSpec::root("CN=Chain Root")
        };
        let root = issue_cert(&root_spec, &rsa_key(1), &rsa_key(1));
        let mid_spec = CertSpec {
            ca: Some(None),
            serial: 3,
            ..CertSpec::leaf("CN=Intermediate", "CN=Chain Root")
        };
        let mid = issue_cert(&mid_spec, &rsa_key(2), &rsa_key(1));
        let leaf_spec = CertSpec::leaf("CN=Leaf", "CN=Intermediate");
        let leaf = issue_cert(&leaf_spec, &rsa_key(0), &rsa_key(2));
        let anchors = TrustStore::from_certificates(vec![root.clone()]);

        assert_eq!(
            validate(&[mid.clone(), root.clone()], &anchors, now()),
            ChainVerdict::Trusted
        );
        assert_eq!(validate(&[leaf, mid, root], &anchors, now()), ChainVerdict::Malformed);
    }

    #[test]
    fn test_revocation_data() {
        let pki = pki();
        let anchors = TrustStore::from_certificates(vec![pki.root.clone()]);
        let chain = [pki.leaf.clone(), pki.root.clone()];

        let good = RevocationData::new().covering(&pki.root);
        let verdict = ChainValidator::new(&anchors)
            .with_revocation(Some(&good))
            .validate(&chain, now());
        assert_eq!(verdict, ChainVerdict::Trusted);

        let revoked = RevocationData::new().with_revoked(&pki.leaf);
        assert_eq!(revoked.status(&pki.leaf), RevocationStatus::Revoked);
        let verdict = ChainValidator::new(&anchors)
            .with_revocation(Some(&revoked))
            .validate(&chain, now());
        assert_eq!(verdict, ChainVerdict::RevokedUnknown);

        let uncovered = RevocationData::new();
        let verdict = ChainValidator::new(&anchors)
            .with_revocation(Some(&uncovered))
            .validate(&chain, now());
        assert_eq!(verdict, ChainVerdict::RevokedUnknown);
    }

    #[test]
    fn test_expired_outranks_untrusted_root() {
        let pki = pki();
        let late = Utc.with_ymd_and_hms(2045, 1, 1, 0, 0, 0).unwrap();
        let verdict = validate(&[pki.leaf, pki.root], &TrustStore::new(), late);
        assert_eq!(verdict, ChainVerdict::Expired);
    }

    #[test]
    fn test_trust_store_matches_by_subject_and_key() {
        let pki = pki();
        let reissued = issue_cert(
            &CertSpec {
                serial: 9,
                ..CertSpec::root("CN=Chain Root")
            },
            &rsa_key(1),
            &rsa_key(1),
        );
        let store = TrustStore::from_certificates(vec![reissued]);
        assert!(store.contains(&pki.root));
        assert!(!store.contains(&pki.leaf));
    }

    #[test]
    fn test_empty_chain_is_malformed() {
        assert_eq!(validate(&[], &TrustStore::new(), now()), ChainVerdict::Malformed);
    }
}
