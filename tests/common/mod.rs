//! Shared fixtures for integration tests: keys, certificates and a minimal
//! classic-xref PDF.

#![allow(dead_code)]

use certseal::signatures::{KeyMaterial, TrustStore};
use chrono::{DateTime, TimeZone, Utc};
use der::asn1::{AnyRef, BitString, OctetString, UtcTime};
use der::pem::LineEnding;
use der::{Any, Encode, EncodePem};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier, SubjectPublicKeyInfoOwned};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::ext::pkix::BasicConstraints;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");

/// A fixed instant inside every default validity window.
pub fn signing_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

/// A fixed validation instant after [`signing_time`].
pub fn check_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// A one-page PDF with a classic xref table; the content stream is padded
/// until the file is at least `min_len` bytes.
pub fn sample_pdf(min_len: usize) -> Vec<u8> {
    let mut content = String::from("BT /F1 24 Tf 72 720 Td (Certificate of Completion) Tj ET\n");
    while content.len() + 400 < min_len {
        content.push_str("% padding line for the certificate body\n");
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        "<< /Title (Certificate) /Producer (certseal tests) >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let header = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    pdf.extend_from_slice(header.as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

/// Deterministic 2048-bit RSA keys, generated once per test binary.
pub fn rsa_key(index: usize) -> RsaPrivateKey {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    let keys = KEYS.get_or_init(|| {
        (0..4u64)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(0xC0DE + seed);
                RsaPrivateKey::new(&mut rng, 2048).unwrap()
            })
            .collect()
    });
    keys[index].clone()
}

/// Parameters for a test certificate.
#[derive(Debug, Clone)]
pub struct CertSpec {
    pub subject: String,
    pub issuer: String,
    pub serial: u8,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// `Some(path_len)` adds basicConstraints with cA set.
    pub ca: Option<Option<u8>>,
}

impl CertSpec {
    pub fn root(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            issuer: subject.to_string(),
            serial: 1,
            not_before: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap(),
            ca: Some(None),
        }
    }

    pub fn intermediate(subject: &str, issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            serial: 3,
            ca: Some(Some(0)),
            ..Self::root(subject)
        }
    }

    pub fn leaf(subject: &str, issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            serial: 2,
            ca: None,
            ..Self::root(subject)
        }
    }

    pub fn valid_until(mut self, not_after: DateTime<Utc>) -> Self {
        self.not_after = not_after;
        self
    }
}

/// Build a certificate for `subject_key`, signed by `issuer_key` with
/// sha256WithRSAEncryption.
pub fn issue_cert(
    spec: &CertSpec,
    subject_key: &RsaPrivateKey,
    issuer_key: &RsaPrivateKey,
) -> Certificate {
    let algorithm = AlgorithmIdentifierOwned {
        oid: SHA256_WITH_RSA,
        parameters: Some(Any::from(AnyRef::NULL)),
    };
    let time = |t: DateTime<Utc>| {
        let since_epoch = Duration::from_secs(t.timestamp() as u64);
        Time::UtcTime(UtcTime::from_unix_duration(since_epoch).unwrap())
    };

    let extensions = spec.ca.map(|path_len| {
        let bc = BasicConstraints {
            ca: true,
            path_len_constraint: path_len,
        };
        vec![Extension {
            extn_id: BASIC_CONSTRAINTS,
            critical: true,
            extn_value: OctetString::new(bc.to_der().unwrap()).unwrap(),
        }]
    });

    let public_key = RsaPublicKey::from(subject_key);
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[spec.serial]).unwrap(),
        signature: algorithm.clone(),
        issuer: Name::from_str(&spec.issuer).unwrap(),
        validity: Validity {
            not_before: time(spec.not_before),
            not_after: time(spec.not_after),
        },
        subject: Name::from_str(&spec.subject).unwrap(),
        subject_public_key_info: SubjectPublicKeyInfoOwned::from_key(public_key).unwrap(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions,
    };

    let signing_key = SigningKey::<Sha256>::new(issuer_key.clone());
    let signature = signing_key.sign(&tbs_certificate.to_der().unwrap());
    Certificate {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&signature.to_vec()).unwrap(),
    }
}

/// A root, an intermediate and a leaf, with the signer's key material and a
/// trust store holding the root.
pub struct Pki {
    pub root: Certificate,
    pub intermediate: Certificate,
    pub leaf: Certificate,
    pub key: KeyMaterial,
    pub trust: TrustStore,
}

impl Pki {
    pub fn new() -> Self {
        Self::with_leaf(CertSpec::leaf("CN=Jane Signer,O=Certificates", "CN=Issuing CA"))
    }

    /// Use `leaf_spec` for the end-entity certificate.
    pub fn with_leaf(leaf_spec: CertSpec) -> Self {
        let root_key = rsa_key(1);
        let intermediate_key = rsa_key(2);
        let leaf_key = rsa_key(0);

        let root = issue_cert(&CertSpec::root("CN=Test Root CA"), &root_key, &root_key);
        let intermediate = issue_cert(
            &CertSpec::intermediate("CN=Issuing CA", "CN=Test Root CA"),
            &intermediate_key,
            &root_key,
        );
        let leaf = issue_cert(&leaf_spec, &leaf_key, &intermediate_key);

        let chain = vec![leaf.clone(), intermediate.clone(), root.clone()];
        let key = KeyMaterial::new(leaf_key, chain).unwrap();
        let trust = TrustStore::from_certificates(vec![root.clone()]);
        Self {
            root,
            intermediate,
            leaf,
            key,
            trust,
        }
    }

    /// PKCS#8 PEM of the signer's private key.
    pub fn key_pem(&self) -> String {
        rsa_key(0).to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
    }

    /// PEM bundle of the chain, leaf first.
    pub fn chain_pem(&self) -> String {
        [&self.leaf, &self.intermediate, &self.root]
            .iter()
            .map(|cert| cert.to_pem(LineEnding::LF).unwrap())
            .collect()
    }

    /// PEM of the trust anchor.
    pub fn root_pem(&self) -> String {
        self.root.to_pem(LineEnding::LF).unwrap()
    }
}

/// Leaf issued directly by a self-signed root: key material for the leaf and
/// the root certificate.
pub fn two_level_chain() -> (KeyMaterial, Certificate) {
    let root_key = rsa_key(1);
    let leaf_key = rsa_key(0);
    let root = issue_cert(&CertSpec::root("CN=Direct Root"), &root_key, &root_key);
    let leaf_spec = CertSpec::leaf("CN=Direct Signer", "CN=Direct Root");
    let leaf = issue_cert(&leaf_spec, &leaf_key, &root_key);
    (KeyMaterial::new(leaf_key, vec![leaf, root.clone()]).unwrap(), root)
}
