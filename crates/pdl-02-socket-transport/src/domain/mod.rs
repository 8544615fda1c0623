//! # Domain Layer
//!
//! Wire protocol, errors, configuration and the per-product lock table.

pub mod config;
pub mod errors;
pub mod locks;
pub mod protocol;
