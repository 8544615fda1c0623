//! # Adapters Module
//!
//! Source and sink implementations of the ports.
//!
//! | Adapter | Source | Sink |
//! |---------|--------|------|
//! | `object` | replays a `Product` | rebuilds a `Product` |
//! | `xml` | incremental decode | incremental encode |
//! | `json` | buffered decode | buffered encode |
//! | `digest` | - | canonical digest |

pub mod digest;
pub mod json;
pub mod object;
pub mod xml;
