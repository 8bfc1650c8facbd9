//! Signer key material.

use super::digest::hash_bytes;
use super::types::{oids, DigestAlgorithm};
use crate::error::{Error, Result};
use der::oid::AssociatedOid;
use der::{Decode, Encode};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::Verifier;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

/// A private key and its certificate chain (leaf first, root last).
///
/// Lives only for the duration of a signing call. The private key is
/// zeroized when the value is dropped and never appears in `Debug` output.
pub struct KeyMaterial {
    private_key: RsaPrivateKey,
    chain: Vec<Certificate>,
}

impl KeyMaterial {
    /// Pair a private key with its chain.
    pub fn new(private_key: RsaPrivateKey, chain: Vec<Certificate>) -> Result<Self> {
        if chain.is_empty() {
            return Err(Error::KeyMismatch("certificate chain is empty".to_string()));
        }
        Ok(Self { private_key, chain })
    }

    /// Load a PKCS#8 or PKCS#1 PEM private key and a PEM certificate bundle.
    pub fn from_pem(key_pem: &str, chain_pem: &[u8]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(key_pem))
            .map_err(|e| Error::Crypto(format!("unreadable private key: {}", e)))?;
        let chain = Certificate::load_pem_chain(chain_pem)?;
        Self::new(private_key, chain)
    }

    /// Load a PKCS#8 or PKCS#1 DER private key and DER certificates.
    pub fn from_der(key_der: &[u8], chain_der: &[Vec<u8>]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_der(key_der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(key_der))
            .map_err(|e| Error::Crypto(format!("unreadable private key: {}", e)))?;
        let chain = chain_der
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(private_key, chain)
    }

    /// The signer certificate.
    pub fn leaf(&self) -> &Certificate {
        &self.chain[0]
    }

    /// The full chain, leaf first.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Fail with `KeyMismatch` unless the private key belongs to the leaf.
    pub fn check_key_matches_leaf(&self) -> Result<()> {
        let spki = &self.leaf().tbs_certificate.subject_public_key_info;
        let leaf_key = rsa_public_key(spki).ok_or_else(|| {
            Error::KeyMismatch("leaf certificate does not carry an RSA public key".to_string())
        })?;
        if RsaPublicKey::from(&self.private_key) != leaf_key {
            return Err(Error::KeyMismatch(
                "private key does not match the leaf certificate".to_string(),
            ));
        }
        Ok(())
    }

    /// DER encodings of the chain.
    pub fn chain_der(&self) -> Result<Vec<Vec<u8>>> {
        self.chain
            .iter()
            .map(|cert| cert.to_der().map_err(Error::from))
            .collect()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key", &"[REDACTED]")
            .field("chain_len", &self.chain.len())
            .field("leaf_subject", &self.leaf().tbs_certificate.subject.to_string())
            .finish()
    }
}

/// RSA public key carried by a SubjectPublicKeyInfo, if any.
pub(crate) fn rsa_public_key(spki: &SubjectPublicKeyInfoOwned) -> Option<RsaPublicKey> {
    if spki.algorithm.oid != oids::RSA_ENCRYPTION {
        return None;
    }
    RsaPublicKey::from_pkcs1_der(spki.subject_public_key.raw_bytes()).ok()
}

fn pkcs1v15_scheme(algorithm: DigestAlgorithm) -> Pkcs1v15Sign {
    match algorithm {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

/// RSA PKCS#1 v1.5 signature over `message`.
///
/// Deterministic: the same key and message always give the same signature.
pub(crate) fn sign_message(
    key: &RsaPrivateKey,
    algorithm: DigestAlgorithm,
    message: &[u8],
) -> Result<Vec<u8>> {
    let hashed = hash_bytes(message, algorithm);
    Ok(key.sign(pkcs1v15_scheme(algorithm), &hashed)?)
}

/// Check an RSA PKCS#1 v1.5 signature over an already computed digest.
pub(crate) fn verify_prehashed(
    key: &RsaPublicKey,
    algorithm: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> bool {
    key.verify(pkcs1v15_scheme(algorithm), hashed, signature).is_ok()
}

/// Check an RSA PKCS#1 v1.5 signature over `message`.
pub(crate) fn verify_message(
    key: &RsaPublicKey,
    algorithm: DigestAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> bool {
    match algorithm {
        DigestAlgorithm::Sha256 => verify_with::<Sha256>(key, message, signature),
        DigestAlgorithm::Sha384 => verify_with::<Sha384>(key, message, signature),
        DigestAlgorithm::Sha512 => verify_with::<Sha512>(key, message, signature),
    }
}

fn verify_with<D>(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool
where
    D: Digest + AssociatedOid,
{
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<D>::new(key.clone())
        .verify(message, &signature)
        .is_ok()
}
