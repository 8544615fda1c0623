//! # Ports Layer
//!
//! - **Inbound (Driving)**: `ProductSignatureApi`

pub mod inbound;
