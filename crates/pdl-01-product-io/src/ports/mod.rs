//! # Ports Layer
//!
//! - **Inbound (Driving)**: `ProductSource`
//! - **Outbound (Driven)**: `ProductSink`

pub mod inbound;
pub mod outbound;
