//! Signature verification.
//!
//! Recovers the signed range and the embedded signature from a signed file
//! alone, recomputes the digest, checks the signature value and evaluates
//! the certificate chain. Failed checks are reported in the verdict; only a
//! missing or unparsable signature dictionary or CMS blob is an error.

use super::byterange::{bytes_to_hex, ByteRange};
use super::chain::{ChainValidator, RevocationData, TrustStore};
use super::cms::EmbeddedSignature;
use super::digest::{digest_ranges, hash_bytes};
use super::types::{
    oids, CertificateSummary, ChainVerdict, DigestAlgorithm, SignatureInfo, SignatureSubFilter,
    VerificationVerdict,
};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::{decode_hex, parse_object};
use chrono::{DateTime, Utc};
use der::Encode;
use x509_cert::Certificate;

/// Options for a verification call.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Instant at which the chain must be valid (default: now)
    pub at_time: Option<DateTime<Utc>>,
    /// Caller-supplied revocation data; revocation is not checked when absent
    pub revocation: Option<RevocationData>,
}

impl VerifyOptions {
    /// Validate the chain at a fixed instant.
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.at_time = Some(time);
        self
    }

    /// Check revocation against `revocation`.
    pub fn with_revocation(mut self, revocation: RevocationData) -> Self {
        self.revocation = Some(revocation);
        self
    }
}

/// Verifies signed documents against a set of trust anchors.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    trust_store: TrustStore,
}

impl SignatureVerifier {
    /// Create a verifier for `trust_store`.
    pub fn new(trust_store: TrustStore) -> Self {
        Self { trust_store }
    }

    /// Add a trusted root certificate.
    pub fn add_trusted_root(&mut self, cert: Certificate) {
        self.trust_store.add(cert);
    }

    /// The trust anchors in use.
    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, dict: &Dictionary) -> SignatureInfo {
        let text = |key: &str| dict.get(key).and_then(Object::as_text);
        SignatureInfo {
            signer_name: text("Name"),
            signing_date: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            byte_range: dict
                .get("ByteRange")
                .and_then(Object::as_array)
                .map(|values| values.iter().filter_map(Object::as_integer).collect())
                .unwrap_or_default(),
        }
    }

    /// Verify the last signature in `data`.
    pub fn verify(&self, data: &[u8], options: &VerifyOptions) -> Result<VerificationVerdict> {
        let located = locate_signature_dictionary(data)?;
        let info = self.extract_signature_info(&located.dict);

        match info.sub_filter {
            Some(sub_filter) if sub_filter.is_detached_cms() => {},
            Some(sub_filter) => {
                return Err(Error::Malformed(format!(
                    "unsupported /SubFilter {}",
                    sub_filter.as_pdf_name()
                )))
            },
            None => return Err(Error::Malformed("missing or unknown /SubFilter".to_string())),
        }

        let contents = located
            .dict
            .get("Contents")
            .and_then(Object::as_string)
            .ok_or_else(|| Error::Malformed("/Contents is not a string".to_string()))?;
        let embedded = EmbeddedSignature::parse(contents)?;
        let algorithm = embedded.digest_algorithm();

        let mut messages = Vec::new();
        if algorithm.is_none() {
            messages.push(format!("unsupported digest algorithm {}", embedded.digest_oid()));
        }
        let (byte_range, usable) = check_byte_range(data, &located, contents, &mut messages);
        let covers_whole_document = byte_range
            .as_ref()
            .is_some_and(|range| range.covers_all_but_gap(data.len()));

        let content_digest = match (&byte_range, algorithm) {
            (Some(range), Some(algorithm)) if usable => {
                Some(digest_ranges(data, range, algorithm)?)
            },
            _ => None,
        };

        let mut digest_matches = match &content_digest {
            Some(digest) => embedded.digest_matches(digest.as_bytes()),
            None => false,
        };
        if content_digest.is_some() && !digest_matches {
            messages.push("document digest does not match the signed digest".to_string());
        }
        if let Some(content_type) = embedded.content_type() {
            if content_type != oids::ID_DATA {
                digest_matches = false;
                messages.push(format!("unexpected signed content type {}", content_type));
            }
        }

        let at_time = options.at_time.unwrap_or_else(Utc::now);
        let (signature_valid, chain, signer) = match embedded.signer_certificate() {
            Some(cert) => {
                let digest_bytes = content_digest
                    .as_ref()
                    .map(|d| d.as_bytes().to_vec())
                    .unwrap_or_default();
                let signature_valid = match embedded.verify_signature(cert, &digest_bytes) {
                    Ok(valid) => valid,
                    Err(e) => {
                        messages.push(e.to_string());
                        false
                    },
                };
                if !signature_valid {
                    messages.push("signature value does not verify".to_string());
                }

                let report = ChainValidator::new(&self.trust_store)
                    .with_revocation(options.revocation.as_ref())
                    .validate_from(cert, embedded.certificates(), at_time);
                if let Some(detail) = report.detail {
                    messages.push(detail);
                }
                (signature_valid, report.verdict, Some(summarize(cert)?))
            },
            None => {
                messages.push("signer certificate is not included in the signature".to_string());
                (false, ChainVerdict::Malformed, None)
            },
        };

        // Without signed attributes the signature itself binds the digest.
        if !embedded.has_signed_attributes() {
            digest_matches = digest_matches && signature_valid;
        }

        log::debug!(
            "verified signature: digest {}, signature {}, chain {}",
            digest_matches,
            signature_valid,
            chain
        );

        Ok(VerificationVerdict {
            digest_matches,
            signature_valid,
            chain,
            signing_time: embedded.signing_time(),
            digest_algorithm: algorithm,
            byte_range,
            covers_whole_document,
            signer,
            info,
            messages,
        })
    }
}

/// Verify the last signature in `signed_document` against `trust_anchors`,
/// validating the chain at the current time.
pub fn verify(signed_document: &[u8], trust_anchors: &TrustStore) -> Result<VerificationVerdict> {
    SignatureVerifier::new(trust_anchors.clone()).verify(signed_document, &VerifyOptions::default())
}

/// SHA-256 fingerprint of a certificate's DER encoding.
pub fn certificate_fingerprint(cert: &Certificate) -> Result<Vec<u8>> {
    Ok(hash_bytes(&cert.to_der()?, DigestAlgorithm::Sha256))
}

/// Colon-separated uppercase hex, e.g. `AB:CD:01`.
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|b| bytes_to_hex(std::slice::from_ref(b)))
        .collect::<Vec<_>>()
        .join(":")
}

fn summarize(cert: &Certificate) -> Result<CertificateSummary> {
    let tbs = &cert.tbs_certificate;
    Ok(CertificateSummary {
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        serial: bytes_to_hex(tbs.serial_number.as_bytes()),
        fingerprint: format_fingerprint(&certificate_fingerprint(cert)?),
    })
}

/// The signature dictionary and its position in the file.
struct LocatedSignature {
    dict: Dictionary,
    start: usize,
    end: usize,
}

/// Find the last dictionary holding a `/ByteRange` and parse it.
fn locate_signature_dictionary(data: &[u8]) -> Result<LocatedSignature> {
    let key = b"/ByteRange";
    let key_pos = data
        .windows(key.len())
        .rposition(|w| w == key)
        .ok_or_else(|| Error::Malformed("no signature dictionary found".to_string()))?;

    let obj_pos = data[..key_pos]
        .windows(3)
        .enumerate()
        .rev()
        .find(|&(i, w)| w == b"obj" && !(i >= 3 && &data[i - 3..i] == b"end"))
        .map(|(i, _)| i)
        .ok_or_else(|| Error::Malformed("signature dictionary has no object header".to_string()))?;

    let start = obj_pos + 3;
    let input = &data[start..];
    let (rest, obj) = parse_object(input)
        .map_err(|_| Error::Malformed("unparsable signature dictionary".to_string()))?;
    let end = data.len() - rest.len();

    let dict = match obj {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(Error::Malformed(format!(
                "signature object is a {}, not a dictionary",
                other.type_name()
            )))
        },
    };
    if !dict.contains_key("ByteRange") || !dict.contains_key("Contents") {
        return Err(Error::Malformed(
            "signature dictionary lacks /ByteRange or /Contents".to_string(),
        ));
    }

    Ok(LocatedSignature { dict, start, end })
}

/// Read and sanity-check `/ByteRange`; problems become messages.
///
/// Returns the parsed range, if any, and whether it is safe to digest: in
/// bounds, covering the whole file but one gap, with the gap enclosing
/// exactly the `/Contents` string of the signature dictionary.
fn check_byte_range(
    data: &[u8],
    located: &LocatedSignature,
    contents: &[u8],
    messages: &mut Vec<String>,
) -> (Option<ByteRange>, bool) {
    let values = located
        .dict
        .get("ByteRange")
        .and_then(Object::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let range = match ByteRange::from_pdf_array(values) {
        Ok(range) => range,
        Err(e) => {
            log::warn!("unusable /ByteRange: {}", e);
            messages.push(e.to_string());
            return (None, false);
        },
    };
    if let Err(e) = range.check_bounds(data.len()) {
        log::warn!("/ByteRange out of bounds: {}", e);
        messages.push(e.to_string());
        return (Some(range), false);
    }

    if !range.covers_all_but_gap(data.len()) {
        log::warn!("/ByteRange does not cover the whole file");
        messages.push(format!(
            "byte range ends at {} of {} bytes or leaves more than one gap",
            range.end(),
            data.len()
        ));
        return (Some(range), false);
    }

    let aligned = range.gap().is_some_and(|(offset, length)| {
        let window = &data[offset..offset + length];
        offset >= located.start
            && offset + length <= located.end
            && window.len() >= 2
            && window[0] == b'<'
            && window[window.len() - 1] == b'>'
            && decode_hex(&window[1..window.len() - 1]).is_ok_and(|decoded| decoded == contents)
    });
    if !aligned {
        log::warn!("/ByteRange gap does not enclose the /Contents string");
        messages.push("byte range gap does not match the signature contents".to_string());
    }

    (Some(range), aligned)
}
