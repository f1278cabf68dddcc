//! Test utilities for treesync-client
//!
//! Provides an in-memory [`ChannelTransport`] for driving subscriptions frame
//! by frame, and an [`SseTestServer`] for end-to-end tests over HTTP.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::sse::Event;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use treesync_core::Location;

use crate::config::ClientConfig;
use crate::streaming::{EventFrame, EventTransport, FrameKind, FrameStream, StreamError, StreamResult};
use crate::{Result, TreeSyncClient};

type FrameTx = mpsc::UnboundedSender<StreamResult<EventFrame>>;

/// Write side of one stream opened through a [`ChannelTransport`]
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: Arc<Mutex<Option<FrameTx>>>,
}

impl FrameSender {
    /// Deliver a frame
    pub fn send(&self, frame: EventFrame) {
        self.send_result(Ok(frame));
    }

    /// Deliver a `put` frame
    pub fn put(&self, path: &str, data: Value) {
        let payload = json!({ "path": path, "data": data });
        self.send(EventFrame::new(FrameKind::Put, payload.to_string()));
    }

    /// Deliver a `patch` frame
    pub fn patch(&self, path: &str, data: Value) {
        let payload = json!({ "path": path, "data": data });
        self.send(EventFrame::new(FrameKind::Patch, payload.to_string()));
    }

    /// Deliver a `keep-alive` frame
    pub fn keep_alive(&self) {
        self.send(EventFrame::new(FrameKind::KeepAlive, "null"));
    }

    /// Fail the stream with `err`
    pub fn fail(&self, err: StreamError) {
        self.send_result(Err(err));
    }

    /// End the stream as if the server closed it
    pub fn end(&self) {
        self.tx.lock().take();
    }

    /// Whether the stream was ended or its reader dropped
    pub fn is_closed(&self) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }

    fn send_result(&self, item: StreamResult<EventFrame>) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(item);
        }
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    connections: Vec<FrameSender>,
    failures: VecDeque<StreamError>,
}

/// In-memory transport: every successful open creates a channel whose write
/// side the test drives through a [`FrameSender`]
#[derive(Debug)]
pub struct ChannelTransport {
    state: Mutex<ChannelState>,
    opens: watch::Sender<usize>,
}

impl ChannelTransport {
    /// Create a transport
    pub fn new() -> Arc<Self> {
        let (opens, _) = watch::channel(0);
        Arc::new(Self {
            state: Mutex::new(ChannelState::default()),
            opens,
        })
    }

    /// Make the next open attempt fail with `err`; failures queue up
    pub fn fail_next_open(&self, err: StreamError) {
        self.state.lock().failures.push_back(err);
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        *self.opens.borrow()
    }

    /// Write side of the `index`-th opened stream
    pub fn connection(&self, index: usize) -> Option<FrameSender> {
        self.state.lock().connections.get(index).cloned()
    }

    /// Write side of the most recently opened stream
    pub fn latest(&self) -> Option<FrameSender> {
        self.state.lock().connections.last().cloned()
    }

    /// Wait until at least `count` streams have been opened
    pub async fn wait_for_open(&self, count: usize) -> FrameSender {
        let mut rx = self.opens.subscribe();
        let _ = rx.wait_for(|opens| *opens >= count).await;
        let state = self.state.lock();
        state.connections[count - 1].clone()
    }
}

#[async_trait]
impl EventTransport for ChannelTransport {
    async fn open(&self, _location: &Location) -> StreamResult<FrameStream> {
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.push(FrameSender {
            tx: Arc::new(Mutex::new(Some(tx))),
        });
        drop(state);
        self.opens.send_modify(|opens| *opens += 1);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }
}

/// Build a `put` event for an axum SSE response
pub fn put_event(path: &str, data: Value) -> Event {
    Event::default()
        .event("put")
        .data(json!({ "path": path, "data": data }).to_string())
}

/// Build a `patch` event for an axum SSE response
pub fn patch_event(path: &str, data: Value) -> Event {
    Event::default()
        .event("patch")
        .data(json!({ "path": path, "data": data }).to_string())
}

/// Build a `keep-alive` event for an axum SSE response
pub fn keep_alive_event() -> Event {
    Event::default().event("keep-alive").data("null")
}

/// An SSE test server that automatically shuts down when dropped
pub struct SseTestServer {
    pub addr: SocketAddr,
    pub client: TreeSyncClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SseTestServer {
    /// Start a server for an axum Router with a default client
    ///
    /// # Example
    ///
    /// ```ignore
    /// use treesync_client::testing::{put_event, SseTestServer};
    ///
    /// let server = SseTestServer::start(router).await?;
    /// let location = server.location("/rooms")?;
    /// let mut changes = server.client.subscribe(&location);
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with_config(router, ClientConfig::default()).await
    }

    /// Start a server with a client built from `config`
    pub async fn start_with_config<S>(router: axum::Router<S>, config: ClientConfig) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = TreeSyncClient::from_config(&config)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Location for `path` on this server
    pub fn location(&self, path: &str) -> Result<Location> {
        Ok(Location::parse(&format!("{}{}", self.base_url(), path))?)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SseTestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
