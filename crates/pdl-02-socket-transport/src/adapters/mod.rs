//! # Adapters Layer
//!
//! `ProductStorage` implementations.

pub mod json_file;
pub mod memory;
