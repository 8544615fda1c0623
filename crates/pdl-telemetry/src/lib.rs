//! # PDL Telemetry
//!
//! Structured logging for product distribution nodes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdl_telemetry::{init_tracing, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_tracing(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | unset | Filter directives, overrides `PDL_LOG_LEVEL` |
//! | `PDL_SERVICE_NAME` | `pdl-node` | Service name in startup logs |
//! | `PDL_LOG_LEVEL` | `info` | Log level filter |
//! | `PDL_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PDL_JSON_LOGS` | `false` | JSON formatted logs (default `true` in containers) |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{env_filter, init_tracing};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}
