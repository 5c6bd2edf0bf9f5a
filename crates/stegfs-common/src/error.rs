//! Error handling utilities and common error types
//!
//! Standardized error handling across the stegfs engine, in the shape of
//! `mef_common::error::MefError`: one `thiserror` enum with a handful of
//! named kinds rather than stringly-typed panics.

use thiserror::Error;

/// Common result type for stegfs operations.
pub type StegResult<T> = Result<T, StegError>;

/// Common error kinds shared by the lower layers of the engine (the
/// permutator, the crypto primitives and the carrier providers). The
/// authenticated file layer (`stegfs-file`) has its own richer error type
/// that wraps this one alongside `std::io::Error`.
#[derive(Error, Debug)]
pub enum StegError {
    /// The carrier's header did not match any supported format, or the
    /// matched format's own constraints (bit depth, color type, bits per
    /// pixel) were violated.
    #[error("invalid carrier: {0}")]
    InvalidCarrier(String),

    /// The payload length trailer could not be decoded, or decoded to a
    /// value exceeding device capacity.
    #[error("payload extraction error: {0}")]
    PayloadExtraction(String),

    /// Any other invariant violation (e.g. a permutator built over size 0).
    #[error("{0}")]
    Other(String),
}

impl StegError {
    pub fn invalid_carrier(msg: impl Into<String>) -> Self {
        StegError::InvalidCarrier(msg.into())
    }

    pub fn payload_extraction(msg: impl Into<String>) -> Self {
        StegError::PayloadExtraction(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        StegError::Other(msg.into())
    }
}

impl From<StegError> for std::io::Error {
    fn from(err: StegError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
    }
}
