//! # Product I/O Errors
//!
//! Failures raised while streaming a product between a source and a sink.

use shared_types::ProductError;
use thiserror::Error;

/// Errors from product sources, sinks and encodings.
#[derive(Debug, Error)]
pub enum ProductIoError {
    /// Input is not a well-formed product document
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Embedded content ended before its declared length
    #[error("Content '{path}' truncated: expected {expected} bytes, got {actual}")]
    TruncatedContent {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Content bytes disagree with the declared length
    #[error("Content '{path}' length mismatch: declared {declared} bytes, got {actual}")]
    ContentLengthMismatch {
        path: String,
        declared: u64,
        actual: u64,
    },

    /// Content bytes disagree with the declared SHA-256
    #[error("Content '{path}' digest mismatch: declared {declared}, computed {computed}")]
    ContentDigestMismatch {
        path: String,
        declared: String,
        computed: String,
    },

    /// Leading bytes match no known encoding
    #[error("Unknown product encoding")]
    UnknownEncoding,

    /// The JSON document form needs a URL for every non-primary content
    #[error("Content '{0}' has no URL and cannot be written to a JSON document")]
    MissingContentUrl(String),

    /// A sink event arrived out of order
    #[error("Unexpected event: {0}")]
    UnexpectedEvent(&'static str),

    /// Product model error
    #[error(transparent)]
    Product(#[from] ProductError),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProductIoError {
    /// Shorthand for a malformed input error.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        ProductIoError::MalformedInput(reason.to_string())
    }
}

impl From<serde_json::Error> for ProductIoError {
    fn from(error: serde_json::Error) -> Self {
        match error.classify() {
            serde_json::error::Category::Io => ProductIoError::Io(error.into()),
            _ => ProductIoError::malformed(error),
        }
    }
}

/// Result alias for product I/O.
pub type Result<T> = std::result::Result<T, ProductIoError>;
