//! # Verification Errors

use pdl_01_product_io::ProductIoError;
use shared_crypto::CryptoError;
use shared_types::ProductId;
use thiserror::Error;

/// Why a product signature was not accepted.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// No configured key applies to the product and unknown signers are
    /// not allowed
    #[error("no candidate keys for product {0}")]
    NoCandidateKeys(ProductId),

    /// Candidate keys exist but none validates the signature
    #[error("signature of product {0} not verified by any candidate key")]
    VerificationFailed(ProductId),

    /// A configured key could not be loaded
    #[error("malformed key '{name}': {source}")]
    MalformedKey {
        name: String,
        #[source]
        source: CryptoError,
    },

    /// Signing failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The product digest could not be computed
    #[error("unable to compute product digest: {0}")]
    Digest(#[from] ProductIoError),
}
