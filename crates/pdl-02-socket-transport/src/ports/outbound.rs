//! # Outbound Ports (Driven Ports / SPI)
//!
//! What the receiver needs from the rest of the node.

use shared_types::{Product, ProductId};
use thiserror::Error;

use crate::domain::errors::StorageError;

/// Product storage.
///
/// `store_product` must fail with `StorageError::AlreadyExists` for an id
/// that is already stored.
#[async_trait::async_trait]
pub trait ProductStorage: Send + Sync {
    /// Whether a product with this id is stored.
    async fn has_product(&self, id: &ProductId) -> Result<bool, StorageError>;

    /// Store a product, returning its id.
    async fn store_product(&self, product: Product) -> Result<ProductId, StorageError>;

    /// Load a stored product.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StorageError>;
}

/// The verifier did not accept a product.
#[derive(Debug, Clone, Error)]
#[error("signature rejected: {reason}")]
pub struct VerificationRejected {
    pub reason: String,
}

/// Signature check applied to every received product before it is stored.
#[async_trait::async_trait]
pub trait ProductVerifier: Send + Sync {
    async fn verify(&self, product: &Product) -> Result<(), VerificationRejected>;
}
