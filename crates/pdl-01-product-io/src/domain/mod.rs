//! # Domain Layer
//!
//! Encoding tags, error types and the canonical product digest.

pub mod digest;
pub mod encoding;
pub mod errors;
