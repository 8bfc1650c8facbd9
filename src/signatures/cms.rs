//! CMS `SignedData` encoding and decoding for detached PDF signatures.
//!
//! ```text
//! ContentInfo
//!   contentType: id-signedData
//!   content: SignedData
//!     version: 1
//!     digestAlgorithms: { sha-256 | sha-384 | sha-512 }
//!     encapContentInfo: { id-data, no content }
//!     certificates: { leaf, intermediates..., root }
//!     signerInfos: { SignerInfo
//!         sid: issuerAndSerialNumber
//!         signedAttrs: { content-type, signing-time, message-digest }
//!         signatureAlgorithm: shaNNNWithRSAEncryption
//!         signature }
//! ```

use super::credentials::{rsa_public_key, verify_message, verify_prehashed};
use super::types::{oids, DigestAlgorithm};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use der::asn1::{AnyRef, GeneralizedTime, OctetString, SetOfVec, UtcTime};
use der::oid::ObjectIdentifier;
use der::{Any, Decode, Encode, SliceReader};
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;
use x509_cert::attr::Attribute;
use x509_cert::time::Time;
use x509_cert::Certificate;

/// First instant that must be encoded as GeneralizedTime (RFC 5652 11.3).
const GENERALIZED_TIME_FROM: i64 = 2_524_608_000; // 2050-01-01T00:00:00Z

/// Algorithm identifier for a digest, parameters absent.
pub(crate) fn digest_algorithm_identifier(algorithm: DigestAlgorithm) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: algorithm.oid(),
        parameters: None,
    }
}

/// Algorithm identifier for RSA PKCS#1 v1.5 with a digest, NULL parameters.
pub(crate) fn rsa_signature_algorithm(algorithm: DigestAlgorithm) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: algorithm.rsa_signature_oid(),
        parameters: Some(Any::from(AnyRef::NULL)),
    }
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

fn signing_time_value(time: &DateTime<Utc>) -> Result<Any> {
    let secs = u64::try_from(time.timestamp())
        .map_err(|_| Error::Config(format!("signing time {} predates 1970", time)))?;
    let duration = Duration::from_secs(secs);
    let time = if time.timestamp() < GENERALIZED_TIME_FROM {
        Time::UtcTime(UtcTime::from_unix_duration(duration)?)
    } else {
        Time::GeneralTime(GeneralizedTime::from_unix_duration(duration)?)
    };
    Ok(Any::encode_from(&time)?)
}

/// Signed attributes binding the content type, signing time and digest.
pub(crate) fn signed_attributes(
    message_digest: &[u8],
    signing_time: &DateTime<Utc>,
) -> Result<SignedAttributes> {
    let attrs = vec![
        attribute(oids::CONTENT_TYPE, Any::encode_from(&oids::ID_DATA)?)?,
        attribute(oids::SIGNING_TIME, signing_time_value(signing_time)?)?,
        attribute(
            oids::MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(message_digest)?)?,
        )?,
    ];
    Ok(SetOfVec::try_from(attrs)?)
}

/// Assemble a DER-encoded `ContentInfo` around a single signer.
pub(crate) fn encode_signed_data(
    algorithm: DigestAlgorithm,
    chain: &[Certificate],
    signed_attrs: SignedAttributes,
    signature: Vec<u8>,
) -> Result<Vec<u8>> {
    let leaf = chain
        .first()
        .ok_or_else(|| Error::KeyMismatch("certificate chain is empty".to_string()))?;

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: leaf.tbs_certificate.issuer.clone(),
            serial_number: leaf.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: digest_algorithm_identifier(algorithm),
        signed_attrs: Some(signed_attrs),
        signature_algorithm: rsa_signature_algorithm(algorithm),
        signature: OctetString::new(signature)?,
        unsigned_attrs: None,
    };

    let certificates = chain
        .iter()
        .cloned()
        .map(CertificateChoices::Certificate)
        .collect::<Vec<_>>();

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![digest_algorithm_identifier(algorithm)])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: oids::ID_DATA,
            econtent: None,
        },
        certificates: Some(CertificateSet(SetOfVec::try_from(certificates)?)),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
    };

    let content_info = ContentInfo {
        content_type: oids::ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data)?,
    };
    Ok(content_info.to_der()?)
}

/// A decoded detached signature, as found in a `/Contents` string.
#[derive(Debug, Clone)]
pub struct EmbeddedSignature {
    signer_info: SignerInfo,
    certificates: Vec<Certificate>,
    digest_algorithm: Option<DigestAlgorithm>,
}

impl EmbeddedSignature {
    /// Decode a `ContentInfo`, ignoring trailing placeholder padding.
    pub fn parse(contents: &[u8]) -> Result<Self> {
        let mut reader = SliceReader::new(contents)?;
        let content_info = ContentInfo::decode(&mut reader)
            .map_err(|e| Error::Malformed(format!("signature is not a CMS ContentInfo: {}", e)))?;
        if content_info.content_type != oids::ID_SIGNED_DATA {
            return Err(Error::Malformed(format!(
                "unexpected CMS content type {}",
                content_info.content_type
            )));
        }

        let signed_data = SignedData::from_der(&content_info.content.to_der()?)
            .map_err(|e| Error::Malformed(format!("unreadable SignedData: {}", e)))?;

        let mut signer_infos = signed_data.signer_infos.0.into_vec();
        if signer_infos.len() != 1 {
            return Err(Error::Malformed(format!(
                "expected one signer, found {}",
                signer_infos.len()
            )));
        }
        let signer_info = signer_infos.remove(0);

        let digest_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid);
        if digest_algorithm.is_none() {
            log::warn!("signer uses unsupported digest {}", signer_info.digest_alg.oid);
        }

        let certificates = signed_data
            .certificates
            .map(|set| set.0.into_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|choice| match choice {
                CertificateChoices::Certificate(cert) => Some(cert),
                _ => None,
            })
            .collect();

        Ok(Self {
            signer_info,
            certificates,
            digest_algorithm,
        })
    }

    /// Digest algorithm named by the signer, if it is one we can compute.
    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        self.digest_algorithm
    }

    /// Raw digest algorithm OID from the signer info.
    pub fn digest_oid(&self) -> ObjectIdentifier {
        self.signer_info.digest_alg.oid
    }

    /// Every certificate carried in the signature, in encoded order.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// The certificate the signer identifier points at.
    pub fn signer_certificate(&self) -> Option<&Certificate> {
        match &self.signer_info.sid {
            SignerIdentifier::IssuerAndSerialNumber(id) => self.certificates.iter().find(|cert| {
                cert.tbs_certificate.issuer == id.issuer
                    && cert.tbs_certificate.serial_number == id.serial_number
            }),
            SignerIdentifier::SubjectKeyIdentifier(_) => None,
        }
    }

    fn find_attribute(&self, oid: ObjectIdentifier) -> Option<&Any> {
        self.signer_info
            .signed_attrs
            .as_ref()?
            .iter()
            .find(|attr| attr.oid == oid)
            .and_then(|attr| attr.values.iter().next())
    }

    /// Value of the message-digest attribute.
    pub fn message_digest(&self) -> Option<Vec<u8>> {
        let any = self.find_attribute(oids::MESSAGE_DIGEST)?;
        let octets = OctetString::from_der(&any.to_der().ok()?).ok()?;
        Some(octets.as_bytes().to_vec())
    }

    /// Value of the signing-time attribute.
    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        let any = self.find_attribute(oids::SIGNING_TIME)?;
        let time = Time::from_der(&any.to_der().ok()?).ok()?;
        let secs = i64::try_from(time.to_unix_duration().as_secs()).ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Value of the content-type attribute.
    pub fn content_type(&self) -> Option<ObjectIdentifier> {
        let any = self.find_attribute(oids::CONTENT_TYPE)?;
        ObjectIdentifier::from_der(&any.to_der().ok()?).ok()
    }

    /// Whether the signer used signed attributes.
    pub fn has_signed_attributes(&self) -> bool {
        self.signer_info.signed_attrs.is_some()
    }

    /// Check the digest binding against a freshly computed document digest.
    ///
    /// With signed attributes the message-digest attribute must equal
    /// `content_digest`; without them the signature itself covers the digest
    /// and the check is deferred to [`Self::verify_signature`].
    pub fn digest_matches(&self, content_digest: &[u8]) -> bool {
        match &self.signer_info.signed_attrs {
            Some(_) => self.message_digest().as_deref() == Some(content_digest),
            None => true,
        }
    }

    /// Verify the signature value with the signer certificate's RSA key.
    pub fn verify_signature(&self, signer: &Certificate, content_digest: &[u8]) -> Result<bool> {
        let Some(algorithm) = self.digest_algorithm else {
            return Err(Error::UnsupportedAlgorithm(format!("digest {}", self.digest_oid())));
        };
        let sig_oid = self.signer_info.signature_algorithm.oid;
        if sig_oid != oids::RSA_ENCRYPTION
            && DigestAlgorithm::from_rsa_signature_oid(&sig_oid) != Some(algorithm)
        {
            return Err(Error::UnsupportedAlgorithm(format!("signature {}", sig_oid)));
        }

        let Some(key) = rsa_public_key(&signer.tbs_certificate.subject_public_key_info) else {
            return Err(Error::UnsupportedAlgorithm(
                "signer certificate key is not RSA".to_string(),
            ));
        };
        let signature = self.signer_info.signature.as_bytes();

        Ok(match &self.signer_info.signed_attrs {
            Some(attrs) => verify_message(&key, algorithm, &attrs.to_der()?, signature),
            None => verify_prehashed(&key, algorithm, content_digest, signature),
        })
    }
}
