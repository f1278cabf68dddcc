//! Reconnecting stream connection

use std::sync::Arc;

use futures::stream::StreamExt;
use tracing::debug;
use treesync_core::Location;

use super::transport::{EventTransport, FrameStream};
use super::types::{ConnectionEvent, StreamError};

/// One logical long-lived stream for a location.
///
/// The connection holds at most one open [`FrameStream`]. When that stream
/// fails or ends it is dropped and reported as
/// [`ConnectionEvent::Interrupted`]; the following call to
/// [`next_event`](Self::next_event) opens a new one. Opening happens inside
/// `next_event`, so there is never more than one attempt in flight.
pub struct StreamConnection {
    transport: Arc<dyn EventTransport>,
    location: Location,
    current: Option<FrameStream>,
    closed: bool,
    opens: u64,
}

impl StreamConnection {
    /// Create a connection; nothing is opened until the first `next_event`
    pub fn new(transport: Arc<dyn EventTransport>, location: Location) -> Self {
        Self {
            transport,
            location,
            current: None,
            closed: false,
            opens: 0,
        }
    }

    /// The location this connection streams
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Whether a stream is currently open
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Whether the owner closed the connection
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of streams opened so far
    pub fn opens(&self) -> u64 {
        self.opens
    }

    /// Drop the current stream; the next `next_event` opens a fresh one
    pub fn reopen(&mut self) {
        if self.current.take().is_some() {
            debug!(location = %self.location, "Dropped current stream for reopen");
        }
    }

    /// Close permanently; the transport is released immediately
    pub fn close(&mut self) {
        if !self.closed {
            debug!(location = %self.location, "Closing stream connection");
        }
        self.closed = true;
        self.current = None;
    }

    /// Advance the connection by one step.
    ///
    /// Returns `None` once the connection is closed. Cancel-safe: dropping
    /// the future mid-open or mid-read loses no state.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.closed {
            return None;
        }

        if self.current.is_none() {
            return Some(match self.transport.open(&self.location).await {
                Ok(stream) => {
                    self.current = Some(stream);
                    self.opens += 1;
                    ConnectionEvent::Opened
                }
                Err(e) => ConnectionEvent::Interrupted(e),
            });
        }

        let stream = self.current.as_mut()?;
        let event = match stream.next().await {
            Some(Ok(frame)) => return Some(ConnectionEvent::Frame(frame)),
            Some(Err(e)) => ConnectionEvent::Interrupted(e),
            None => ConnectionEvent::Interrupted(StreamError::Closed),
        };

        // The stream is finished either way
        self.current = None;
        Some(event)
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("location", &self.location)
            .field("open", &self.current.is_some())
            .field("closed", &self.closed)
            .field("opens", &self.opens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::types::{EventFrame, FrameKind};
    use crate::testing::ChannelTransport;

    fn location() -> Location {
        Location::parse("https://db.example.com/rooms").unwrap()
    }

    #[tokio::test]
    async fn test_opens_then_yields_frames() {
        let transport = ChannelTransport::new();
        let mut conn = StreamConnection::new(transport.clone(), location());

        assert_eq!(conn.next_event().await, Some(ConnectionEvent::Opened));
        assert!(conn.is_open());

        transport.latest().unwrap().keep_alive();
        assert_eq!(
            conn.next_event().await,
            Some(ConnectionEvent::Frame(EventFrame::new(FrameKind::KeepAlive, "null")))
        );
    }

    #[tokio::test]
    async fn test_server_close_reopens_immediately() {
        let transport = ChannelTransport::new();
        let mut conn = StreamConnection::new(transport.clone(), location());

        conn.next_event().await;
        transport.latest().unwrap().end();

        assert_eq!(
            conn.next_event().await,
            Some(ConnectionEvent::Interrupted(StreamError::Closed))
        );
        assert!(!conn.is_open());
        assert_eq!(conn.next_event().await, Some(ConnectionEvent::Opened));
        assert_eq!(transport.open_count(), 2);
        assert_eq!(conn.opens(), 2);
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let transport = ChannelTransport::new();
        transport.fail_next_open(StreamError::Transport("connection refused".into()));
        let mut conn = StreamConnection::new(transport.clone(), location());

        assert_eq!(
            conn.next_event().await,
            Some(ConnectionEvent::Interrupted(StreamError::Transport(
                "connection refused".into()
            )))
        );
        assert_eq!(conn.next_event().await, Some(ConnectionEvent::Opened));
    }

    #[tokio::test]
    async fn test_close_releases_transport() {
        let transport = ChannelTransport::new();
        let mut conn = StreamConnection::new(transport.clone(), location());

        conn.next_event().await;
        let sender = transport.latest().unwrap();
        assert!(!sender.is_closed());

        conn.close();
        assert!(sender.is_closed());
        assert_eq!(conn.next_event().await, None);
        assert_eq!(transport.open_count(), 1);
    }
}
