//! # Product Signatures
//!
//! Algorithm selection by key type and signature version:
//!
//! | Version | DSA | RSA |
//! |---------|-----|-----|
//! | v1 | `SHA1withDSA` | `SHA1withRSA` (PKCS#1 v1.5) |
//! | v2 | `SHA256withDSA` | `RSASSA-PSS` (SHA-256, MGF1-SHA-256) |
//!
//! The RSA-PSS salt length is derived from the modulus size so that
//! independent implementations agree bit-for-bit:
//! `((modulusBits + 6) / 8) - 32 - 2`.
//!
//! DSA signatures are DER `SEQUENCE { r, s }`. Signatures travel as base64.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::{Pkcs1v15Sign, Pss};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use shared_types::SignatureVersion;
use signature::{DigestSigner, DigestVerifier, SignatureEncoding};

use crate::errors::CryptoError;
use crate::keys::{KeyType, PrivateKey, PublicKey};

/// SHA-256 output length in bytes.
const SHA256_LEN: usize = 32;

/// Concrete signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// DSA over SHA-1
    Sha1WithDsa,
    /// RSA PKCS#1 v1.5 over SHA-1
    Sha1WithRsa,
    /// DSA over SHA-256
    Sha256WithDsa,
    /// RSA-PSS over SHA-256 with MGF1-SHA-256
    RsaPssSha256,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignatureAlgorithm::Sha1WithDsa => "SHA1withDSA",
            SignatureAlgorithm::Sha1WithRsa => "SHA1withRSA",
            SignatureAlgorithm::Sha256WithDsa => "SHA256withDSA",
            SignatureAlgorithm::RsaPssSha256 => "RSASSA-PSS",
        })
    }
}

/// Pick the scheme for a key type and signature version.
pub fn signature_algorithm(key_type: KeyType, version: SignatureVersion) -> SignatureAlgorithm {
    match (key_type, version) {
        (KeyType::Dsa, SignatureVersion::V1) => SignatureAlgorithm::Sha1WithDsa,
        (KeyType::Rsa, SignatureVersion::V1) => SignatureAlgorithm::Sha1WithRsa,
        (KeyType::Dsa, SignatureVersion::V2) => SignatureAlgorithm::Sha256WithDsa,
        (KeyType::Rsa, SignatureVersion::V2) => SignatureAlgorithm::RsaPssSha256,
    }
}

/// RSA-PSS salt length for a modulus of `modulus_bits` bits.
pub fn pss_salt_length(modulus_bits: usize) -> Result<usize, CryptoError> {
    ((modulus_bits + 6) / 8)
        .checked_sub(SHA256_LEN + 2)
        .filter(|salt| *salt > 0)
        .ok_or(CryptoError::KeyTooSmall { bits: modulus_bits })
}

/// Sign `data`, returning a base64 signature.
pub fn sign(
    key: &PrivateKey,
    data: &[u8],
    version: SignatureVersion,
) -> Result<String, CryptoError> {
    let mut rng = rand::thread_rng();
    let raw = match (key, signature_algorithm(key.key_type(), version)) {
        (PrivateKey::Dsa(key), SignatureAlgorithm::Sha1WithDsa) => dsa_sign::<Sha1>(key, data)?,
        (PrivateKey::Dsa(key), _) => dsa_sign::<Sha256>(key, data)?,
        (PrivateKey::Rsa(key), SignatureAlgorithm::Sha1WithRsa) => key
            .sign_with_rng(&mut rng, Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(data))
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?,
        (PrivateKey::Rsa(key), _) => {
            let salt = pss_salt_length(key_bits(key))?;
            key.sign_with_rng(
                &mut rng,
                Pss::new_with_salt::<Sha256>(salt),
                &Sha256::digest(data),
            )
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?
        }
    };
    Ok(STANDARD.encode(raw))
}

/// Check a base64 `signature` over `data`.
///
/// A signature that is not valid base64, or not a valid encoding for the
/// scheme, verifies as `false`.
pub fn verify(
    key: &PublicKey,
    data: &[u8],
    signature: &str,
    version: SignatureVersion,
) -> Result<bool, CryptoError> {
    let cleaned: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
    let Ok(raw) = STANDARD.decode(cleaned) else {
        return Ok(false);
    };

    let valid = match (key, signature_algorithm(key.key_type(), version)) {
        (PublicKey::Dsa(key), SignatureAlgorithm::Sha1WithDsa) => dsa_verify::<Sha1>(key, data, &raw),
        (PublicKey::Dsa(key), _) => dsa_verify::<Sha256>(key, data, &raw),
        (PublicKey::Rsa(key), SignatureAlgorithm::Sha1WithRsa) => key
            .verify(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(data), &raw)
            .is_ok(),
        (PublicKey::Rsa(key), _) => {
            let salt = pss_salt_length(key_bits(key))?;
            key.verify(
                Pss::new_with_salt::<Sha256>(salt),
                &Sha256::digest(data),
                &raw,
            )
            .is_ok()
        }
    };
    Ok(valid)
}

fn key_bits(key: &impl rsa::traits::PublicKeyParts) -> usize {
    key.n().bits()
}

fn dsa_sign<D>(key: &dsa::SigningKey, data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    D: Digest,
    dsa::SigningKey: DigestSigner<D, dsa::Signature>,
{
    let signature: dsa::Signature = key
        .try_sign_digest(D::new_with_prefix(data))
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
    Ok(signature.to_vec())
}

fn dsa_verify<D>(key: &dsa::VerifyingKey, data: &[u8], raw: &[u8]) -> bool
where
    D: Digest,
    dsa::VerifyingKey: DigestVerifier<D, dsa::Signature>,
{
    match dsa::Signature::try_from(raw) {
        Ok(signature) => key.verify_digest(D::new_with_prefix(data), &signature).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MESSAGE: &[u8] = include_bytes!("../testdata/message.txt");

    fn rsa_private() -> PrivateKey {
        PrivateKey::from_bytes(include_bytes!("../testdata/rsa_private.pem"), None).unwrap()
    }

    fn dsa_private() -> PrivateKey {
        PrivateKey::from_bytes(include_bytes!("../testdata/dsa_private.pem"), None).unwrap()
    }

    fn rsa_public() -> PublicKey {
        PublicKey::from_bytes(include_bytes!("../testdata/rsa_public.pem")).unwrap()
    }

    fn dsa_public() -> PublicKey {
        PublicKey::from_bytes(include_bytes!("../testdata/dsa_public.pem")).unwrap()
    }

    #[test]
    fn test_algorithm_table() {
        use SignatureVersion::{V1, V2};
        assert_eq!(signature_algorithm(KeyType::Dsa, V1).to_string(), "SHA1withDSA");
        assert_eq!(signature_algorithm(KeyType::Rsa, V1).to_string(), "SHA1withRSA");
        assert_eq!(signature_algorithm(KeyType::Dsa, V2).to_string(), "SHA256withDSA");
        assert_eq!(signature_algorithm(KeyType::Rsa, V2).to_string(), "RSASSA-PSS");
    }

    #[test]
    fn test_pss_salt_length_known_sizes() {
        assert_eq!(pss_salt_length(1024).unwrap(), 94);
        assert_eq!(pss_salt_length(2048).unwrap(), 222);
        assert_eq!(pss_salt_length(2047).unwrap(), 222);
        assert_eq!(pss_salt_length(4096).unwrap(), 478);
        assert!(matches!(
            pss_salt_length(256),
            Err(CryptoError::KeyTooSmall { bits: 256 })
        ));
    }

    #[test]
    fn test_verifies_openssl_signatures() {
        let cases = [
            (rsa_public(), include_str!("../testdata/rsa_v1.sig.b64"), SignatureVersion::V1),
            (rsa_public(), include_str!("../testdata/rsa_v2.sig.b64"), SignatureVersion::V2),
            (dsa_public(), include_str!("../testdata/dsa_v1.sig.b64"), SignatureVersion::V1),
            (dsa_public(), include_str!("../testdata/dsa_v2.sig.b64"), SignatureVersion::V2),
        ];
        for (key, signature, version) in cases {
            assert!(
                verify(&key, MESSAGE, signature, version).unwrap(),
                "{key:?} {version}"
            );
        }
    }

    #[test]
    fn test_version_mismatch_fails() {
        let signature = include_str!("../testdata/rsa_v2.sig.b64");
        assert!(!verify(&rsa_public(), MESSAGE, signature, SignatureVersion::V1).unwrap());
        let signature = include_str!("../testdata/dsa_v1.sig.b64");
        assert!(!verify(&dsa_public(), MESSAGE, signature, SignatureVersion::V2).unwrap());
    }

    #[test]
    fn test_sign_verify_all_combinations() {
        for private in [rsa_private(), dsa_private()] {
            let public = private.public_key();
            for version in [SignatureVersion::V1, SignatureVersion::V2] {
                let signature = sign(&private, MESSAGE, version).unwrap();
                assert!(verify(&public, MESSAGE, &signature, version).unwrap());
                assert!(!verify(&public, b"tampered", &signature, version).unwrap());
            }
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let signature = sign(&rsa_private(), MESSAGE, SignatureVersion::V2).unwrap();
        let other = PublicKey::from_bytes(include_bytes!("../testdata/ssh_rsa.pub")).unwrap();
        assert!(!verify(&other, MESSAGE, &signature, SignatureVersion::V2).unwrap());
        assert!(!verify(&dsa_public(), MESSAGE, &signature, SignatureVersion::V2).unwrap());
    }

    #[test]
    fn test_undecodable_signature_is_false() {
        assert!(!verify(&rsa_public(), MESSAGE, "not base64!", SignatureVersion::V1).unwrap());
        assert!(!verify(&dsa_public(), MESSAGE, "AAAA", SignatureVersion::V1).unwrap());
    }

    #[test]
    fn test_signature_with_line_breaks() {
        let signature = sign(&rsa_private(), MESSAGE, SignatureVersion::V1).unwrap();
        let wrapped: String = signature
            .as_bytes()
            .chunks(76)
            .map(|chunk| format!("{}\n", String::from_utf8_lossy(chunk)))
            .collect();
        assert!(verify(&rsa_public(), MESSAGE, &wrapped, SignatureVersion::V1).unwrap());
    }

    proptest! {
        #[test]
        fn prop_pss_salt_formula(bits in 544usize..16384) {
            let salt = pss_salt_length(bits).unwrap();
            prop_assert_eq!(salt, ((bits + 6) / 8) - 32 - 2);
        }
    }
}
