//! # Ports Layer
//!
//! - **Inbound (Driving)**: `ProductSender`
//! - **Outbound (Driven)**: `ProductStorage`, `ProductVerifier`

pub mod inbound;
pub mod outbound;
