//! Common error types for treesync core types

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building locations or decoding change payloads
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The location URL could not be parsed or has no host
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// A `put`/`patch` payload did not have the `{path, data}` shape
    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),
}
