//! # Transport Errors

use std::io;

use pdl_01_product_io::ProductIoError;
use shared_types::{ProductError, ProductId};
use thiserror::Error;

use crate::limits::SizeLimitExceeded;

/// Errors that end one connection.
///
/// The `Display` form is what the peer receives in a `RECEIVE_ERROR` reply.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The version string exceeded its length cap
    #[error("bad protocol version")]
    BadProtocolVersion,

    /// The peer speaks a version other than 0.1
    #[error("unsupported protocol version '{0}'")]
    UnsupportedVersion(String),

    /// A framed string exceeded its length cap
    #[error("field of {actual} bytes exceeds maxLength {max}")]
    FieldTooLong { max: u32, actual: u32 },

    /// A framed string was not UTF-8
    #[error("field is not valid UTF-8")]
    InvalidUtf8,

    /// The handshake product id does not parse
    #[error("invalid product id: {0}")]
    InvalidProductId(#[source] ProductError),

    /// The payload describes a different product than the handshake
    #[error("product {actual} does not match handshake id {expected}")]
    IdMismatch {
        expected: ProductId,
        actual: ProductId,
    },

    /// The payload exceeded the configured size limit
    #[error("product exceeds size limit of {limit} bytes")]
    SizeLimitExceeded { limit: u64 },

    /// A read waited longer than the read timeout
    #[error("read timed out")]
    Timeout,

    /// The payload could not be decoded
    #[error("{0}")]
    Decode(#[source] ProductIoError),

    /// The product signature was not accepted
    #[error("{0}")]
    Rejected(String),

    /// Storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Socket failure
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        if let Some(exceeded) = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<SizeLimitExceeded>())
        {
            return TransportError::SizeLimitExceeded {
                limit: exceeded.limit,
            };
        }
        match error.kind() {
            io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(error),
        }
    }
}

impl From<ProductIoError> for TransportError {
    fn from(error: ProductIoError) -> Self {
        match error {
            ProductIoError::Io(io) => io.into(),
            other => TransportError::Decode(other),
        }
    }
}

/// Errors from a product storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A product with this id is already stored
    #[error("product {0} already in storage")]
    AlreadyExists(ProductId),

    /// The stored document could not be encoded or decoded
    #[error("stored product encoding failed: {0}")]
    Encoding(#[from] ProductIoError),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
