//! # dc-core
//!
//! Shared error and result types for the dcard crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{Error, Result};
