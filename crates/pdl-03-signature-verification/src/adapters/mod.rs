//! # Adapters Layer
//!
//! - `transport`: `ProductVerifier` for the socket receiver

pub mod transport;
