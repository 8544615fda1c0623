//! # Error Types
//!
//! Defines error types used across subsystems when building or reading
//! products.

use thiserror::Error;

/// Errors raised by the product model.
#[derive(Debug, Error)]
pub enum ProductError {
    /// Product id string is not a valid `urn:usgs-product:` identifier.
    #[error("Malformed product id '{id}': {reason}")]
    MalformedId { id: String, reason: &'static str },

    /// Signature version is neither `v1` nor `v2`.
    #[error("Invalid signature version '{0}'")]
    InvalidSignatureVersion(String),

    /// Timestamp could not be parsed or is out of range.
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    /// Content bytes live behind a remote URL and cannot be opened locally.
    #[error("Content is not locally readable: {0}")]
    RemoteContent(String),

    /// Reading content bytes failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
