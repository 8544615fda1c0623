//! # Node Runtime Library
//!
//! Configuration and wiring for the `pdl-node` binary, exposed for tests.
//!
//! - `config`: TOML node configuration
//! - `container`: storage, verifier and receiver construction; file sending

pub mod config;
pub mod container;

pub use config::{ConfigError, NodeConfig, StorageKind};
pub use container::{send_file, NodeContainer, NodeError};
