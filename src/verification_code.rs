//! Verification code payload.
//!
//! A signed certificate carries a scannable code pointing at an external
//! lookup service. The payload is a URL of the form
//! `{base}/verify-certificate?id=..&fp=..&date=..` that binds an identifier
//! and the SHA-256 fingerprint of the signing certificate. Rendering the code
//! image is left to the caller.

use crate::error::{Error, Result};
use crate::signatures::{bytes_to_hex, certificate_fingerprint, format_fingerprint};
use chrono::NaiveDate;
use url::Url;
use uuid::Uuid;
use x509_cert::Certificate;

/// Path of the lookup endpoint below the base URL.
pub const VERIFICATION_PATH: &str = "/verify-certificate";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Payload of a scannable verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode {
    base_url: String,
    certificate_id: String,
    fingerprint: Vec<u8>,
    issued: NaiveDate,
    recipient: Option<String>,
    title: Option<String>,
}

impl VerificationCode {
    /// Create a code for a certificate fingerprint with a fresh identifier.
    pub fn new(base_url: &str, fingerprint: Vec<u8>, issued: NaiveDate) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            certificate_id: Uuid::new_v4().to_string(),
            fingerprint,
            issued,
            recipient: None,
            title: None,
        }
    }

    /// Create a code bound to the fingerprint of `signer`.
    pub fn for_certificate(
        base_url: &str,
        signer: &Certificate,
        issued: NaiveDate,
    ) -> Result<Self> {
        Ok(Self::new(base_url, certificate_fingerprint(signer)?, issued))
    }

    /// Use a caller-supplied identifier instead of a generated one.
    pub fn with_certificate_id(mut self, id: impl Into<String>) -> Self {
        self.certificate_id = id.into();
        self
    }

    /// Name of the person the document was issued to.
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Title of the certified work.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Identifier the lookup service resolves.
    pub fn certificate_id(&self) -> &str {
        &self.certificate_id
    }

    /// Raw SHA-256 fingerprint.
    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    /// Fingerprint for display, e.g. `AB:CD:..`.
    pub fn display_fingerprint(&self) -> String {
        format_fingerprint(&self.fingerprint)
    }

    /// Issue date.
    pub fn issued(&self) -> NaiveDate {
        self.issued
    }

    /// Recipient name, if any.
    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    /// Title, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether `fingerprint` (hex, with or without colons) matches this code.
    pub fn matches_fingerprint(&self, fingerprint: &str) -> bool {
        normalize_fingerprint(fingerprint) == bytes_to_hex(&self.fingerprint)
    }

    /// Build the lookup URL.
    pub fn to_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, VERIFICATION_PATH))
            .map_err(|e| Error::Config(format!("invalid verification base URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &self.certificate_id);
            query.append_pair("fp", &bytes_to_hex(&self.fingerprint));
            query.append_pair("date", &self.issued.format(DATE_FORMAT).to_string());
            if let Some(recipient) = &self.recipient {
                query.append_pair("name", recipient);
            }
            if let Some(title) = &self.title {
                query.append_pair("book", title);
            }
        }
        Ok(url)
    }

    /// The payload string to encode into the scannable code.
    pub fn payload(&self) -> Result<String> {
        Ok(self.to_url()?.into())
    }

    /// Parse a payload produced by [`Self::payload`].
    pub fn parse(payload: &str) -> Result<Self> {
        let url = Url::parse(payload)
            .map_err(|e| Error::Malformed(format!("verification code is not a URL: {}", e)))?;

        let path = url.path();
        let prefix = path
            .strip_suffix(VERIFICATION_PATH)
            .ok_or_else(|| Error::Malformed(format!("unexpected verification path {}", path)))?;

        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);
        base.set_path(prefix);
        let base_url = base.as_str().trim_end_matches('/').to_string();

        let mut id = None;
        let mut fp = None;
        let mut date = None;
        let mut recipient = None;
        let mut title = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "id" => id = Some(value.into_owned()),
                "fp" => fp = Some(value.into_owned()),
                "date" => date = Some(value.into_owned()),
                "name" => recipient = Some(value.into_owned()),
                "book" => title = Some(value.into_owned()),
                _ => {},
            }
        }

        let missing = |name: &str| Error::Malformed(format!("verification code lacks `{}`", name));
        let certificate_id = id.ok_or_else(|| missing("id"))?;
        let fingerprint = parse_fingerprint(&fp.ok_or_else(|| missing("fp"))?)?;
        let issued = NaiveDate::parse_from_str(&date.ok_or_else(|| missing("date"))?, DATE_FORMAT)
            .map_err(|e| Error::Malformed(format!("invalid issue date: {}", e)))?;

        Ok(Self {
            base_url,
            certificate_id,
            fingerprint,
            issued,
            recipient,
            title,
        })
    }
}

/// Strip colons and whitespace and uppercase a hex fingerprint.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn parse_fingerprint(text: &str) -> Result<Vec<u8>> {
    let hex = normalize_fingerprint(text);
    if hex.len() != 64 {
        return Err(Error::Malformed(format!(
            "fingerprint must be 32 bytes, got {} hex digits",
            hex.len()
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::Malformed("fingerprint is not hex".to_string()))
        })
        .collect()
}
