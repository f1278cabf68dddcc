//! Live subscription to one location

use std::sync::Arc;

use futures::stream::Stream;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};
use treesync_core::{ChangeKind, ChangeNotification, Location, PatchOp, Snapshot};

use super::connection::StreamConnection;
use super::transport::EventTransport;
use super::types::{ConnectionEvent, EventFrame, FrameKind, StreamError, StreamResult, SubscriptionState};
use super::watchdog::Watchdog;
use crate::config::StreamConfig;

/// A live subscription that keeps a snapshot of one location current
///
/// Change notifications are produced by [`next_change`](Self::next_change)
/// or by the stream returned from [`into_stream`](Self::into_stream).
/// Nothing is opened until the first change is requested.
///
/// # Lifecycle
///
/// - Created via `TreeSyncClient::connect()` (unshared) or driven by a
///   shared `CachedMulticast`
/// - The first root `put` is always reported, even for an empty location
/// - Transport failures, protocol errors and stale connections are
///   recovered by re-opening; the snapshot is kept across re-opens
/// - A rejection by the remote is yielded once as an error, after which the
///   subscription is closed
/// - Call `close()` for explicit cleanup, or let it drop
///
/// # Example
///
/// ```ignore
/// let mut sub = client.connect(&location);
///
/// while let Some(change) = sub.next_change().await {
///     println!("{}", change?.snapshot.value());
/// }
/// ```
pub struct LiveSubscription {
    watchdog: Watchdog,
    snapshot: Arc<Snapshot>,
    /// Set once the first root `put` has been applied
    synced: bool,
    state: watch::Sender<SubscriptionState>,
}

impl LiveSubscription {
    /// Create an idle subscription for `location`
    pub fn new(
        transport: Arc<dyn EventTransport>,
        location: Location,
        config: &StreamConfig,
    ) -> Self {
        let snapshot = Arc::new(Snapshot::empty(location.clone()));
        let connection = StreamConnection::new(transport, location);
        let (state, _) = watch::channel(SubscriptionState::Idle);
        Self {
            watchdog: Watchdog::new(connection, config),
            snapshot,
            synced: false,
            state,
        }
    }

    /// The subscribed location
    pub fn location(&self) -> &Location {
        self.watchdog.connection().location()
    }

    /// The most recently applied snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn state_receiver(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Close the subscription and release the connection
    pub fn close(&mut self) {
        self.watchdog.close();
        self.set_state(SubscriptionState::Closed);
    }

    fn set_state(&self, next: SubscriptionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(
                location = %self.location(),
                from = %previous,
                to = %next,
                "Subscription state changed"
            );
        }
    }

    /// Wait for the next change.
    ///
    /// Returns `None` once the subscription is closed. A terminal error is
    /// returned exactly once before that.
    pub async fn next_change(&mut self) -> Option<StreamResult<ChangeNotification>> {
        loop {
            match self.state() {
                SubscriptionState::Closed => return None,
                SubscriptionState::Idle => self.set_state(SubscriptionState::Connecting),
                _ => {}
            }

            let Some(event) = self.watchdog.next_event().await else {
                self.set_state(SubscriptionState::Closed);
                return None;
            };

            match event {
                ConnectionEvent::Opened => {
                    debug!(location = %self.location(), "Stream opened");
                }
                ConnectionEvent::Frame(frame) => {
                    if matches!(
                        self.state(),
                        SubscriptionState::Connecting | SubscriptionState::Reconnecting
                    ) {
                        self.set_state(SubscriptionState::Streaming);
                    }

                    match self.handle_frame(frame) {
                        Ok(Some(change)) => return Some(Ok(change)),
                        Ok(None) => {}
                        Err(e) if e.is_terminal() => return Some(Err(self.fail(e))),
                        Err(e) => {
                            warn!(location = %self.location(), error = %e, "Discarding stream after bad frame");
                            self.watchdog.force_reopen();
                            self.set_state(SubscriptionState::Reconnecting);
                        }
                    }
                }
                ConnectionEvent::Interrupted(e) if e.is_terminal() => {
                    return Some(Err(self.fail(e)));
                }
                ConnectionEvent::Interrupted(e) => {
                    warn!(location = %self.location(), error = %e, "Stream interrupted, re-opening");
                    if self.state() == SubscriptionState::Streaming {
                        self.set_state(SubscriptionState::Reconnecting);
                    }
                }
            }
        }
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        error!(location = %self.location(), error = %err, "Subscription terminated");
        self.close();
        err
    }

    /// Apply one frame, returning a notification if the snapshot changed or
    /// the frame is the first full value
    fn handle_frame(&mut self, frame: EventFrame) -> StreamResult<Option<ChangeNotification>> {
        let op = match frame.kind {
            FrameKind::Put => PatchOp::decode_put(&frame.data)?,
            FrameKind::Patch => PatchOp::decode_merge(&frame.data)?,
            FrameKind::KeepAlive => {
                trace!("Keep-alive");
                return Ok(None);
            }
            FrameKind::Cancel => {
                return Err(StreamError::rejection(
                    None,
                    reason(&frame.data, "Permission denied"),
                ))
            }
            FrameKind::AuthRevoked => {
                return Err(StreamError::rejection(
                    None,
                    reason(&frame.data, "Auth token revoked"),
                ))
            }
            FrameKind::Other(tag) => {
                debug!(kind = %tag, "Ignoring unknown frame");
                return Ok(None);
            }
        };

        let kind = op.kind();
        let path = op.path().to_string();
        let initial =
            !self.synced && kind == ChangeKind::Put && path.trim_matches('/').is_empty();
        let next = op.apply(&self.snapshot);
        if initial {
            self.synced = true;
        } else if Arc::ptr_eq(&next, &self.snapshot) {
            trace!(path = %path, "Change left snapshot unchanged");
            return Ok(None);
        }

        self.snapshot = next;
        Ok(Some(ChangeNotification::new(
            Arc::clone(&self.snapshot),
            kind,
            path,
        )))
    }

    /// Convert into a stream of changes
    pub fn into_stream(self) -> impl Stream<Item = StreamResult<ChangeNotification>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let change = sub.next_change().await?;
            Some((change, sub))
        })
    }
}

/// Reason carried by a `cancel` or `auth_revoked` frame
fn reason(data: &str, fallback: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(reason)) => reason,
        Ok(Value::Null) => fallback.to_string(),
        _ if data.trim().is_empty() => fallback.to_string(),
        _ => data.to_string(),
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.set_state(SubscriptionState::Closed);
    }
}

impl std::fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("location", self.location())
            .field("state", &self.state())
            .finish()
    }
}
