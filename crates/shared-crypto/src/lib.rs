//! # Shared Crypto - Product Signature Primitives
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `keys` | DSA/RSA key handles and normalization from DER, PEM, X.509, OpenSSH |
//! | `pem` | PEM framing and legacy `Proc-Type` decryption |
//! | `openssh` | OpenSSH public key lines and private key containers |
//! | `signatures` | v1/v2 algorithm selection, sign and verify |
//!
//! ## Interoperability
//!
//! - **DSA**: DER `SEQUENCE { r, s }` signatures, as produced by `SHA1withDSA`
//!   and `SHA256withDSA`
//! - **RSA v1**: PKCS#1 v1.5 with SHA-1
//! - **RSA v2**: RSA-PSS with SHA-256, MGF1-SHA-256 and a salt length
//!   derived from the modulus size

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod keys;
pub mod openssh;
pub mod pem;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use keys::{generate_dsa_key, generate_rsa_key, KeyType, PrivateKey, PublicKey};
pub use signatures::{pss_salt_length, sign, signature_algorithm, verify, SignatureAlgorithm};

/// DSA parameter sizes, for key generation.
pub use dsa::KeySize as DsaKeySize;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
