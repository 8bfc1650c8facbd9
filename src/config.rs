//! Signer configuration.

use crate::error::{Error, Result};
use crate::signatures::{
    DigestAlgorithm, SignOptions, DEFAULT_FIELD_NAME, DEFAULT_MAX_SIGNATURE_SIZE,
};
use serde::Deserialize;
use std::path::Path;

/// Signing configuration, usually read from a JSON file.
///
/// Every field is optional in JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignerConfig {
    /// Digest algorithm.
    pub digest_algorithm: DigestAlgorithm,

    /// Binary capacity reserved for the signature blob.
    pub max_signature_size: usize,

    /// Name of the signature field.
    pub field_name: String,

    /// Signer name written to `/Name`.
    pub signer_name: Option<String>,

    /// Reason for signing.
    pub reason: Option<String>,

    /// Signing location.
    pub location: Option<String>,

    /// Contact information.
    pub contact_info: Option<String>,

    /// Base URL of the verification lookup service.
    pub verification_base_url: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            digest_algorithm: DigestAlgorithm::default(),
            max_signature_size: DEFAULT_MAX_SIGNATURE_SIZE,
            field_name: DEFAULT_FIELD_NAME.to_string(),
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
            verification_base_url: None,
        }
    }

    /// Parse configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid signer configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Set the digest algorithm.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set the signature capacity.
    pub fn with_max_signature_size(mut self, size: usize) -> Self {
        self.max_signature_size = size;
        self
    }

    /// Set the signature field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Set the signer name.
    pub fn with_signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = Some(name.into());
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

    /// Set the verification base URL.
    pub fn with_verification_base_url(mut self, url: impl Into<String>) -> Self {
        self.verification_base_url = Some(url.into());
        self
    }

    /// Reject values no signing run can use.
    pub fn validate(&self) -> Result<()> {
        if self.max_signature_size == 0 {
            return Err(Error::Config("max_signature_size must be positive".to_string()));
        }
        if self.field_name.is_empty() {
            return Err(Error::Config("field_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Convert into signing options.
    pub fn sign_options(&self) -> SignOptions {
        SignOptions {
            digest_algorithm: self.digest_algorithm,
            field_name: self.field_name.clone(),
            reason: self.reason.clone(),
            location: self.location.clone(),
            contact_info: self.contact_info.clone(),
            name: self.signer_name.clone(),
            max_signature_size: self.max_signature_size,
            signing_time: None,
        }
    }
}
