//! # Product I/O Subsystem (PDL-01)
//!
//! Push-streaming representation of products.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): encoding tags, errors, canonical digest
//! - **Ports Layer** (`ports/`): `ProductSource` (inbound) and `ProductSink` (outbound)
//! - **Adapters Layer** (`adapters/`): object, XML, JSON and digest implementations
//! - **Service Layer** (`service.rs`): encoding detection and transfer glue
//!
//! ## Memory
//!
//! XML decoding never holds a whole embedded content: bytes cross from the
//! parser to the sink through a [`pipe`] bounded at
//! [`CONTENT_PIPE_CAPACITY`] chunks. The JSON form is buffered by design.

pub mod adapters;
pub mod domain;
pub mod pipe;
pub mod ports;
pub mod service;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export public API
pub use adapters::digest::{product_digest, DigestProductSink};
pub use adapters::json::{JsonProductSink, JsonProductSource, ProductDocument};
pub use adapters::object::{ObjectProductSink, ObjectProductSource};
pub use adapters::xml::{XmlProductSink, XmlProductSource, PRODUCT_XML_NAMESPACE};
pub use domain::encoding::{ProductEncoding, Sniff};
pub use domain::errors::ProductIoError;
pub use pipe::{content_pipe, PipeReader, PipeWriter, CONTENT_PIPE_CAPACITY};
pub use ports::inbound::ProductSource;
pub use ports::outbound::{Completion, ContentBody, ProductSink};
pub use service::{read_product, transfer, write_product, AnyProductSource, Sniffed};
