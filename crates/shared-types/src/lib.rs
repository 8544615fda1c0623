//! # Shared Types Crate
//!
//! This crate contains the product data model shared by every subsystem:
//! product identity, contents and the product entity.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem product types are defined here.
//! - **Millisecond Identity**: `ProductId` update times carry millisecond
//!   resolution, matching the URN and every serialized form.
//! - **Lazy Bytes**: Content bytes are opened on demand and released by
//!   whoever reads them.

pub mod content;
pub mod dates;
pub mod entities;
pub mod errors;

pub use content::{sha256_hex, Content, ContentDescriptor, ContentReader, ContentSource};
pub use entities::{
    Product, ProductId, SignatureVersion, PRODUCT_ID_URN_PREFIX, STATUS_DELETE, STATUS_UPDATE,
};
pub use errors::ProductError;
