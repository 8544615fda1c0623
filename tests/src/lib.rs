//! # Product Distribution Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Encode/decode throughput
//! └── src/integration/  # Sender → receiver flows over loopback TCP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pdl-tests
//! cargo test -p pdl-tests integration::signatures
//! cargo bench -p pdl-tests
//! ```

pub mod integration;
