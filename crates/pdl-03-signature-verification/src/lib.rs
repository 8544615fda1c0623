//! # Signature Verification Subsystem (PDL-03)
//!
//! Decides whether a received product is trusted.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): mode, keychain, outcomes, signing helpers
//! - **Ports Layer** (`ports/`): `ProductSignatureApi`
//! - **Service Layer** (`service.rs`): `SignatureVerifier`
//! - **Adapters Layer** (`adapters/`): hook into the socket receiver
//!
//! ## Trust Notes
//!
//! - A signature is only accepted from a keychain key whose source and type
//!   filters match the product.
//! - Signatures cover the canonical digest, which excludes the tracker URL.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::entities::{ProductKey, ProductKeyChain, VerificationMode, VerificationOutcome};
pub use domain::errors::VerificationError;
pub use domain::signing::{sign_product, verify_product_signature};
pub use ports::inbound::ProductSignatureApi;
pub use service::SignatureVerifier;
