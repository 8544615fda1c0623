//! # Product Signing
//!
//! The signed bytes are the canonical product digest (SHA-1 for v1, SHA-256
//! for v2), so signer and verifier agree regardless of the encoding a
//! product travelled in.

use pdl_01_product_io::product_digest;
use shared_crypto::{PrivateKey, PublicKey};
use shared_types::{Product, SignatureVersion};
use tracing::debug;

use crate::domain::errors::VerificationError;

/// Sign `product` with `key`, setting its signature and signature version.
pub async fn sign_product(
    product: &mut Product,
    key: &PrivateKey,
    version: SignatureVersion,
) -> Result<(), VerificationError> {
    let digest = product_digest(product, version).await?;
    product.signature = Some(shared_crypto::sign(key, &digest, version)?);
    product.signature_version = version;
    Ok(())
}

/// Index of the first candidate that validates the product's signature.
///
/// An unsigned product matches nothing. A key that cannot be used with the
/// product's signature version is skipped.
pub async fn verify_product_signature<'a, I>(
    product: &Product,
    candidates: I,
) -> Result<Option<usize>, VerificationError>
where
    I: IntoIterator<Item = &'a PublicKey>,
{
    let Some(signature) = product.signature.as_deref() else {
        return Ok(None);
    };
    let version = product.signature_version;
    let digest = product_digest(product, version).await?;

    for (index, key) in candidates.into_iter().enumerate() {
        match shared_crypto::verify(key, &digest, signature, version) {
            Ok(true) => return Ok(Some(index)),
            Ok(false) => {}
            Err(error) => debug!(product = %product.id, index, %error, "key unusable"),
        }
    }
    Ok(None)
}
