//! # Socket Transport Subsystem (PDL-02)
//!
//! Moves products between nodes over TCP.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): wire protocol, errors, configuration,
//!   per-product locks
//! - **Ports Layer** (`ports/`): `ProductSender` (inbound), `ProductStorage`
//!   and `ProductVerifier` (outbound)
//! - **Adapters Layer** (`adapters/`): in-memory and JSON-file storage
//! - **Receiver** (`receiver/`): accept loop and connection handling
//! - **Sender** (`sender.rs`): client side
//!
//! ## Guarantees
//!
//! | Concern | Behavior |
//! |---------|----------|
//! | Duplicate delivery | At most one connection per product id stores at a time |
//! | Oversized payloads | Rejected once the size limit is crossed |
//! | Stalled peers | Any read waiting longer than the read timeout fails |
//! | Errors | Reported to the peer as `RECEIVE_ERROR '<message>'` |

pub mod adapters;
pub mod domain;
pub mod limits;
pub mod ports;
pub mod receiver;
pub mod sender;

// Re-export public API
pub use adapters::json_file::JsonFileProductStorage;
pub use adapters::memory::InMemoryProductStorage;
pub use domain::config::{ReceiverConfig, SenderConfig, DEFAULT_PORT, DEFAULT_READ_TIMEOUT};
pub use domain::errors::{StorageError, TransportError};
pub use domain::locks::{ProductLockGuard, ProductLocks};
pub use limits::{SizeLimitExceeded, SizeLimitReader, TimeoutReader};
pub use ports::inbound::ProductSender;
pub use ports::outbound::{ProductStorage, ProductVerifier, VerificationRejected};
pub use receiver::{ReceiveOutcome, SocketProductReceiver};
pub use sender::{SendError, SendOutcome, SocketProductSender};
