//! # Domain Layer
//!
//! Policy entities, errors and the signing helpers.

pub mod entities;
pub mod errors;
pub mod signing;
