//! Error types for treesync client operations

use thiserror::Error;
use treesync_core::CoreError;

use crate::config::ConfigError;
use crate::streaming::StreamError;

/// Result type alias for treesync client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while setting up a client or a subscription.
///
/// Failures of an established subscription are reported as
/// [`StreamError`] items on the change stream instead.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Location could not be parsed
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Change payload did not have the expected shape
    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(#[from] StreamError),
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidLocation(msg) => Self::InvalidLocation(msg),
            CoreError::InvalidPayload(msg) => Self::InvalidPayload(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_keep_their_kind() {
        let err: ClientError = CoreError::InvalidLocation("no host".into()).into();
        assert!(matches!(err, ClientError::InvalidLocation(_)));
        assert_eq!(err.to_string(), "Invalid location: no host");

        let err: ClientError = CoreError::InvalidPayload("missing path".into()).into();
        assert!(matches!(err, ClientError::InvalidPayload(_)));
        assert_eq!(err.to_string(), "Invalid change payload: missing path");
    }
}
