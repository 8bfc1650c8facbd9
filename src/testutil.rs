//! Fixtures shared by unit tests.

use crate::signatures::credentials::sign_message;
use crate::signatures::types::oids;
use crate::signatures::DigestAlgorithm;
use chrono::{DateTime, TimeZone, Utc};
use der::asn1::{AnyRef, BitString, OctetString, UtcTime};
use der::{Any, Encode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
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

/// A one-page PDF with a classic xref table and a content stream padded to
/// roughly `content_len` bytes.
pub(crate) fn sample_pdf(content_len: usize) -> Vec<u8> {
    let mut content = String::from("BT /F1 24 Tf 72 720 Td (Certificate of Completion) Tj ET\n");
    while content.len() < content_len {
        content.push_str("% padding line for the certificate body\n");
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
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
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

/// Deterministic 2048-bit RSA keys, generated once per test binary.
pub(crate) fn rsa_key(index: usize) -> RsaPrivateKey {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    let keys = KEYS.get_or_init(|| {
        (0..3u64)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(0x5EA1 + seed);
                RsaPrivateKey::new(&mut rng, 2048).unwrap()
            })
            .collect()
    });
    keys[index].clone()
}

/// Parameters for a test certificate.
#[derive(Debug, Clone)]
pub(crate) struct CertSpec {
    pub subject: String,
    pub issuer: String,
    pub serial: u8,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// `Some(path_len)` adds basicConstraints with cA set.
    pub ca: Option<Option<u8>>,
}

impl CertSpec {
    /// Self-issued CA certificate.
    pub(crate) fn root(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            issuer: subject.to_string(),
            serial: 1,
            not_before: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap(),
            ca: Some(None),
        }
    }

    /// End-entity certificate issued by `issuer`.
    pub(crate) fn leaf(subject: &str, issuer: &str) -> Self {
        Self {
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            serial: 2,
            ca: None,
            ..Self::root(subject)
        }
    }
}

/// Build a certificate for `subject_key`, signed by `issuer_key`
/// with sha256WithRSAEncryption.
pub(crate) fn issue_cert(
    spec: &CertSpec,
    subject_key: &RsaPrivateKey,
    issuer_key: &RsaPrivateKey,
) -> Certificate {
    let algorithm = AlgorithmIdentifierOwned {
        oid: oids::SHA256_WITH_RSA,
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
            extn_id: oids::BASIC_CONSTRAINTS,
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

    let tbs_der = tbs_certificate.to_der().unwrap();
    let signature = sign_message(issuer_key, DigestAlgorithm::Sha256, &tbs_der).unwrap();
    Certificate {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&signature).unwrap(),
    }
}
