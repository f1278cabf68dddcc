//! Transports that open event streams for a location

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::Stream;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};
use treesync_core::Location;

use super::decoder::decode_frames;
use super::types::{EventFrame, StreamError, StreamResult};

/// A decoded frame stream for one open connection
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamResult<EventFrame>> + Send>>;

/// Opens event streams.
///
/// Dropping the returned [`FrameStream`] must close the underlying
/// connection.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open a new event stream for `location`
    async fn open(&self, location: &Location) -> StreamResult<FrameStream>;
}

/// Error body returned by the remote on a failed request
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Event stream transport over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    auth: Option<String>,
}

impl HttpTransport {
    /// Create a transport with its own HTTP client
    pub fn new(connect_timeout: Duration, auth: Option<String>) -> StreamResult<Self> {
        // No overall request timeout: the response body is a long-lived stream
        // and liveness is the watchdog's job
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self::with_client(client, auth))
    }

    /// Create a transport that reuses an existing HTTP client
    pub fn with_client(client: Client, auth: Option<String>) -> Self {
        Self { client, auth }
    }

    /// Map a non-success status to a stream error
    async fn rejection(response: reqwest::Response) -> StreamError {
        let status = response.status();
        let message = match response.json::<ErrorResponse>().await {
            Ok(err) => err.error,
            Err(_) => format!("HTTP {}", status),
        };

        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            StreamError::Transport(format!("HTTP {}: {}", status.as_u16(), message))
        } else {
            StreamError::rejection(Some(status.as_u16()), message)
        }
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    #[instrument(skip(self), fields(location = %location))]
    async fn open(&self, location: &Location) -> StreamResult<FrameStream> {
        let mut url = location.rest_url()?;
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }

        debug!("Opening event stream");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        debug!(status = %response.status(), "Event stream open");
        Ok(Box::pin(decode_frames(response.bytes_stream())))
    }
}
