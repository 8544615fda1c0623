//! Crypto error types.

use thiserror::Error;

/// Key handling and signing errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be decoded (bad PEM framing, encrypted PEM without
    /// the right password, bad base64, truncated DER, unsupported OpenSSH key type).
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Well-formed key for an algorithm other than DSA or RSA.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// RSA modulus too small for RSA-PSS with SHA-256.
    #[error("RSA modulus of {bits} bits is too small for RSA-PSS")]
    KeyTooSmall {
        /// Modulus size in bits
        bits: usize,
    },

    /// Signature generation failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),
}
