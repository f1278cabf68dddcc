//! Types for live subscriptions

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use treesync_core::CoreError;

/// Kind tag of a decoded event frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Replace the value at a path
    Put,
    /// Merge children into the value at a path
    Patch,
    /// Liveness signal with no payload of interest
    KeepAlive,
    /// The remote revoked read access to the location
    Cancel,
    /// The credential used to open the stream is no longer valid
    AuthRevoked,
    /// Any tag this client does not know about
    Other(String),
}

impl FrameKind {
    /// Decode an `event:` tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "put" => Self::Put,
            "patch" => Self::Patch,
            "keep-alive" => Self::KeepAlive,
            "cancel" => Self::Cancel,
            "auth_revoked" => Self::AuthRevoked,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire tag for this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Put => "put",
            Self::Patch => "patch",
            Self::KeepAlive => "keep-alive",
            Self::Cancel => "cancel",
            Self::AuthRevoked => "auth_revoked",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded unit of the change stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame {
    /// Event kind
    pub kind: FrameKind,
    /// Raw payload, `data:` lines joined with newlines
    pub data: String,
}

impl EventFrame {
    /// Create a frame
    pub fn new(kind: FrameKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }
}

/// What a [`StreamConnection`](super::StreamConnection) reports on each step
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A new stream was opened
    Opened,
    /// A frame arrived on the current stream
    Frame(EventFrame),
    /// The current stream is gone; the next step re-opens unless the error
    /// is terminal
    Interrupted(StreamError),
}

/// Lifecycle state of a live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, nobody has asked for changes yet
    Idle,
    /// First stream is being opened
    Connecting,
    /// Frames are flowing
    Streaming,
    /// The stream was lost and is being re-opened; the snapshot is retained
    Reconnecting,
    /// Terminal
    Closed,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during streaming
///
/// Errors are `Clone` so a single failure can be broadcast to every observer
/// of a shared subscription.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Connection refused, reset, TLS failure or body I/O error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed event framing or payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No frame (not even a keep-alive) arrived in time
    #[error("No frame received for {idle:?}")]
    StaleConnection { idle: Duration },

    /// The server ended the stream
    #[error("Stream closed")]
    Closed,

    /// The remote refused the subscription
    #[error("Subscription rejected by remote: {message}")]
    RemoteRejection {
        /// HTTP status of the initiating request, if the rejection came from one
        status: Option<u16>,
        message: String,
    },

    /// The location cannot be turned into a request
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// The owner closed the subscription
    #[error("Subscription cancelled")]
    Cancelled,
}

impl StreamError {
    /// Terminal errors end the subscription instead of triggering a re-open
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RemoteRejection { .. } | Self::InvalidLocation(_) | Self::Cancelled
        )
    }

    /// Create a rejection from an HTTP status and message
    pub fn rejection(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteRejection {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<CoreError> for StreamError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidLocation(msg) => Self::InvalidLocation(msg),
            CoreError::InvalidPayload(msg) => Self::Protocol(msg),
        }
    }
}

/// Result type for streaming operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_tags() {
        for tag in ["put", "patch", "keep-alive", "cancel", "auth_revoked", "rules_debug"] {
            assert_eq!(FrameKind::from_tag(tag).as_str(), tag);
        }
        assert_eq!(
            FrameKind::from_tag("rules_debug"),
            FrameKind::Other("rules_debug".into())
        );
    }

    #[test]
    fn test_terminal_errors() {
        assert!(StreamError::rejection(Some(401), "Permission denied").is_terminal());
        assert!(StreamError::Cancelled.is_terminal());
        assert!(!StreamError::Closed.is_terminal());
        assert!(!StreamError::Transport("reset".into()).is_terminal());
        assert!(!StreamError::StaleConnection {
            idle: Duration::from_secs(40)
        }
        .is_terminal());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: StreamError = CoreError::InvalidPayload("bad".into()).into();
        assert_eq!(err, StreamError::Protocol("bad".into()));
        assert!(!err.is_terminal());

        let err: StreamError = CoreError::InvalidLocation("nope".into()).into();
        assert!(err.is_terminal());
    }
}
