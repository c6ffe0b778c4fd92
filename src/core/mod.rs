//! Core document types, access keys, sequences and request validation.
//!
//! This module is pure: no I/O, no clocks, no randomness. Everything the
//! lifecycle persists is derived from these types.

mod access_key;
mod builder;
mod error;
mod request;
mod sequence;
mod types;

pub use access_key::*;
pub use builder::*;
pub use error::*;
pub use request::*;
pub use sequence::*;
pub use types::*;
