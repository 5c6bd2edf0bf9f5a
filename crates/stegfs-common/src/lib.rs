//! # StegFS Common Utilities
//!
//! Shared error types and small byte-level helpers used across the stegfs
//! crates: the permutator, the crypto primitives, the carrier providers, the
//! device and the authenticated file layer all build on this crate instead
//! of duplicating big-endian counter arithmetic and error boilerplate.

pub mod endian;
pub mod error;

pub use error::{StegError, StegResult};
