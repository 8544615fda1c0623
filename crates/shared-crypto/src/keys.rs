//! # Key Handles and Normalization
//!
//! Every accepted key encoding resolves to one of two handles:
//! [`PublicKey`] for verification and [`PrivateKey`] for signing.
//!
//! ## Accepted Encodings
//!
//! | Input | Public | Private |
//! |-------|--------|---------|
//! | Binary DER | SubjectPublicKeyInfo, X.509 certificate | PKCS#8 |
//! | PEM (leading `-`) | `PUBLIC KEY`, `RSA PUBLIC KEY`, `CERTIFICATE` | `PRIVATE KEY`, `RSA PRIVATE KEY`, `DSA PRIVATE KEY` (optionally `Proc-Type` encrypted) |
//! | OpenSSH | `ssh-rsa` / `ssh-dss` line | `OPENSSH PRIVATE KEY`, optionally encrypted |
//!
//! DER for an algorithm other than DSA or RSA fails with
//! `UnsupportedKeyType`; anything undecodable fails with `MalformedKey`.

use std::fmt;

use pkcs8::der::asn1::UintRef;
use pkcs8::der::{Decode, Encode, Reader, SliceReader};
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, ObjectIdentifier};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::Certificate;

use crate::errors::CryptoError;
use crate::{openssh, pem};

/// rsaEncryption
const RSA_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// id-dsa
const DSA_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");

/// Algorithm family of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Digital Signature Algorithm
    Dsa,
    /// RSA
    Rsa,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Dsa => f.write_str("DSA"),
            KeyType::Rsa => f.write_str("RSA"),
        }
    }
}

// =============================================================================
// PUBLIC KEY
// =============================================================================

/// Verification key.
#[derive(Clone)]
pub enum PublicKey {
    /// DSA verifying key
    Dsa(dsa::VerifyingKey),
    /// RSA public key
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// Normalize any supported encoding (DER, PEM or OpenSSH text).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if pem::is_pem(bytes) {
            return Self::from_pem(&utf8(bytes)?);
        }
        if openssh::is_openssh_public(bytes) {
            return openssh::parse_public_key(&utf8(bytes)?);
        }
        Self::from_der(bytes).or_else(|error| match error {
            CryptoError::MalformedKey(_) => {
                Self::from_certificate_der(bytes).map_err(|_| error)
            }
            other => Err(other),
        })
    }

    /// Extract the subject key of a DER X.509 certificate.
    pub fn from_certificate_der(der: &[u8]) -> Result<Self, CryptoError> {
        let certificate = Certificate::from_der(der)
            .map_err(|e| CryptoError::MalformedKey(format!("invalid certificate: {e}")))?;
        let spki = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CryptoError::MalformedKey(format!("invalid certificate key: {e}")))?;
        Self::from_der(&spki)
    }

    /// Decode a DER SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let spki = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| CryptoError::MalformedKey(format!("invalid public key DER: {e}")))?;
        let oid = spki.algorithm.oid;
        if oid == RSA_OID {
            RsaPublicKey::from_public_key_der(der)
                .map(PublicKey::Rsa)
                .map_err(|e| CryptoError::MalformedKey(e.to_string()))
        } else if oid == DSA_OID {
            dsa::VerifyingKey::from_public_key_der(der)
                .map(PublicKey::Dsa)
                .map_err(|e| CryptoError::MalformedKey(e.to_string()))
        } else {
            Err(CryptoError::UnsupportedKeyType(oid.to_string()))
        }
    }

    /// Decode a PEM public key.
    pub fn from_pem(text: &str) -> Result<Self, CryptoError> {
        let block = pem::decode(text)?;
        match block.label.as_str() {
            "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_der(&block.der)
                .map(PublicKey::Rsa)
                .map_err(|e| CryptoError::MalformedKey(e.to_string())),
            "CERTIFICATE" => Self::from_certificate_der(&block.der),
            _ => Self::from_der(&block.der),
        }
    }

    /// Decode an OpenSSH `authorized_keys` style line.
    pub fn from_openssh(text: &str) -> Result<Self, CryptoError> {
        openssh::parse_public_key(text)
    }

    /// Algorithm family.
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Dsa(_) => KeyType::Dsa,
            PublicKey::Rsa(_) => KeyType::Rsa,
        }
    }

    /// RSA modulus size, `None` for DSA.
    pub fn modulus_bits(&self) -> Option<usize> {
        match self {
            PublicKey::Rsa(key) => Some(key.n().bits()),
            PublicKey::Dsa(_) => None,
        }
    }

    /// Encode as DER SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        let document = match self {
            PublicKey::Dsa(key) => key.to_public_key_der(),
            PublicKey::Rsa(key) => key.to_public_key_der(),
        }
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Encode as a `PUBLIC KEY` PEM block.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        Ok(pem::encode("PUBLIC KEY", &self.to_der()?))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modulus_bits() {
            Some(bits) => write!(f, "PublicKey({}, {} bits)", self.key_type(), bits),
            None => write!(f, "PublicKey({})", self.key_type()),
        }
    }
}

// =============================================================================
// PRIVATE KEY
// =============================================================================

/// Signing key.
#[derive(Clone)]
pub enum PrivateKey {
    /// DSA signing key
    Dsa(dsa::SigningKey),
    /// RSA private key
    Rsa(RsaPrivateKey),
}

impl PrivateKey {
    /// Normalize any supported encoding. `password` is used for encrypted
    /// OpenSSH keys and `Proc-Type` encrypted PEM.
    pub fn from_bytes(bytes: &[u8], password: Option<&str>) -> Result<Self, CryptoError> {
        if pem::is_pem(bytes) {
            let text = utf8(bytes)?;
            if openssh::is_openssh_private(&text) {
                return openssh::parse_private_key(&text, password);
            }
            return Self::from_pem_with_password(&text, password);
        }
        Self::from_der(bytes)
    }

    /// Decode a DER PKCS#8 PrivateKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)
            .map_err(|e| CryptoError::MalformedKey(format!("invalid private key DER: {e}")))?;
        let oid = info.algorithm.oid;
        if oid == RSA_OID {
            RsaPrivateKey::from_pkcs8_der(der)
                .map(PrivateKey::Rsa)
                .map_err(|e| CryptoError::MalformedKey(e.to_string()))
        } else if oid == DSA_OID {
            dsa::SigningKey::from_pkcs8_der(der)
                .map(PrivateKey::Dsa)
                .map_err(|e| CryptoError::MalformedKey(e.to_string()))
        } else {
            Err(CryptoError::UnsupportedKeyType(oid.to_string()))
        }
    }

    /// Decode a PEM private key (PKCS#8 or traditional OpenSSL form).
    pub fn from_pem(text: &str) -> Result<Self, CryptoError> {
        Self::from_pem_with_password(text, None)
    }

    /// Decode a PEM private key, decrypting a traditional block marked
    /// `Proc-Type: 4,ENCRYPTED`.
    pub fn from_pem_with_password(text: &str, password: Option<&str>) -> Result<Self, CryptoError> {
        let block = pem::decode_with_password(text, password)?;
        match block.label.as_str() {
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(&block.der)
                .map(PrivateKey::Rsa)
                .map_err(|e| CryptoError::MalformedKey(e.to_string())),
            "DSA PRIVATE KEY" => traditional_dsa_key(&block.der).map(PrivateKey::Dsa),
            _ => Self::from_der(&block.der),
        }
    }

    /// Decode an `OPENSSH PRIVATE KEY` block.
    pub fn from_openssh(text: &str, password: Option<&str>) -> Result<Self, CryptoError> {
        openssh::parse_private_key(text, password)
    }

    /// Matching verification key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Dsa(key) => PublicKey::Dsa(key.verifying_key().clone()),
            PrivateKey::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
        }
    }

    /// Algorithm family.
    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Dsa(_) => KeyType::Dsa,
            PrivateKey::Rsa(_) => KeyType::Rsa,
        }
    }

    /// RSA modulus size, `None` for DSA.
    pub fn modulus_bits(&self) -> Option<usize> {
        match self {
            PrivateKey::Rsa(key) => Some(key.n().bits()),
            PrivateKey::Dsa(_) => None,
        }
    }

    /// Encode as a `PRIVATE KEY` (PKCS#8) PEM block.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        let document = match self {
            PrivateKey::Dsa(key) => key.to_pkcs8_der(),
            PrivateKey::Rsa(key) => key.to_pkcs8_der(),
        }
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
        Ok(pem::encode("PRIVATE KEY", document.as_bytes()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modulus_bits() {
            Some(bits) => write!(f, "PrivateKey({}, {} bits)", self.key_type(), bits),
            None => write!(f, "PrivateKey({})", self.key_type()),
        }
    }
}

// =============================================================================
// KEY GENERATION
// =============================================================================

/// Generate an RSA key pair.
pub fn generate_rsa_key(bits: usize) -> Result<PrivateKey, CryptoError> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map(PrivateKey::Rsa)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))
}

/// Generate a DSA key pair with fresh domain parameters.
pub fn generate_dsa_key(size: dsa::KeySize) -> PrivateKey {
    let mut rng = rand::thread_rng();
    let components = dsa::Components::generate(&mut rng, size);
    PrivateKey::Dsa(dsa::SigningKey::generate(&mut rng, components))
}

// =============================================================================
// HELPERS
// =============================================================================

fn utf8(bytes: &[u8]) -> Result<String, CryptoError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CryptoError::MalformedKey("key text is not UTF-8".into()))
}

/// OpenSSL's traditional `DSA PRIVATE KEY` body:
/// `SEQUENCE { version, p, q, g, y, x }`.
fn traditional_dsa_key(der: &[u8]) -> Result<dsa::SigningKey, CryptoError> {
    let malformed = |e: &dyn fmt::Display| CryptoError::MalformedKey(format!("invalid DSA key: {e}"));

    let mut reader = SliceReader::new(der).map_err(|e| malformed(&e))?;
    let values = reader
        .sequence(|seq| {
            let mut values = Vec::with_capacity(6);
            for _ in 0..6 {
                values.push(UintRef::decode(seq)?);
            }
            Ok(values)
        })
        .map_err(|e| malformed(&e))?;

    let int = |index: usize| dsa::BigUint::from_bytes_be(values[index].as_bytes());
    let components =
        dsa::Components::from_components(int(1), int(2), int(3)).map_err(|e| malformed(&e))?;
    let verifying_key =
        dsa::VerifyingKey::from_components(components, int(4)).map_err(|e| malformed(&e))?;
    dsa::SigningKey::from_components(verifying_key, int(5)).map_err(|e| malformed(&e))
}
