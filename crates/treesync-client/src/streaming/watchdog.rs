//! Liveness watchdog
//!
//! The remote sends `keep-alive` frames so that a half-open socket can be told
//! apart from a quiet location. Transport errors never fire for a half-open
//! socket, so this timer is the only thing that catches it.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::connection::StreamConnection;
use super::types::{ConnectionEvent, StreamError};
use crate::config::StreamConfig;

/// Wraps a [`StreamConnection`], re-opening it when frames stop arriving and
/// pacing re-opens after repeated failures.
#[derive(Debug)]
pub struct Watchdog {
    connection: StreamConnection,
    /// Timer window, re-armed on every frame
    stale_timeout: Duration,
    /// Silence that counts as a dead connection when the timer fires
    idle_threshold: Duration,
    /// Pause before re-opening after repeated failures
    error_delay: Duration,
    last_frame: Instant,
    deadline: Instant,
    /// Interruptions since the last frame
    failures: u32,
    /// Set while a paced re-open is pending
    retry_at: Option<Instant>,
}

impl Watchdog {
    /// Wrap `connection` using the timings in `config`
    pub fn new(connection: StreamConnection, config: &StreamConfig) -> Self {
        let now = Instant::now();
        let stale_timeout = config.stale_timeout();
        Self {
            connection,
            stale_timeout,
            idle_threshold: config.idle_threshold(),
            error_delay: config.error_delay(),
            last_frame: now,
            deadline: now + stale_timeout,
            failures: 0,
            retry_at: None,
        }
    }

    /// The wrapped connection
    pub fn connection(&self) -> &StreamConnection {
        &self.connection
    }

    /// When the most recent frame was observed
    pub fn last_frame_at(&self) -> Instant {
        self.last_frame
    }

    /// Drop the current stream and open a new one on the next step
    pub fn force_reopen(&mut self) {
        self.connection.reopen();
        self.note_failure();
    }

    /// Close the wrapped connection permanently
    pub fn close(&mut self) {
        self.retry_at = None;
        self.connection.close();
    }

    fn arm(&mut self, now: Instant) {
        self.deadline = now + self.stale_timeout;
    }

    fn note_failure(&mut self) {
        self.failures += 1;
        // The first failure re-opens straight away, later ones are paced
        if self.failures > 1 {
            self.retry_at = Some(Instant::now() + self.error_delay);
        }
    }

    /// Advance the wrapped connection by one step.
    ///
    /// Frames re-arm the timer. When the timer fires with no frame seen for
    /// `idle_threshold`, the connection is re-opened and
    /// [`StreamError::StaleConnection`] is reported as an interruption.
    /// Returns `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        loop {
            if let Some(retry_at) = self.retry_at {
                debug!(
                    delay_ms = self.error_delay.as_millis() as u64,
                    "Waiting before re-opening stream"
                );
                sleep_until(retry_at).await;
                self.retry_at = None;
                self.arm(Instant::now());
            }

            tokio::select! {
                biased;

                event = self.connection.next_event() => {
                    let event = event?;
                    match &event {
                        ConnectionEvent::Opened => {
                            // An open that never delivers a frame is caught by
                            // the timer armed here
                            self.arm(Instant::now());
                        }
                        ConnectionEvent::Frame(_) => {
                            let now = Instant::now();
                            self.last_frame = now;
                            self.failures = 0;
                            self.arm(now);
                        }
                        ConnectionEvent::Interrupted(e) if e.is_terminal() => {}
                        ConnectionEvent::Interrupted(_) => {
                            // The re-open gets a full window of its own
                            self.note_failure();
                            self.arm(Instant::now());
                        }
                    }
                    return Some(event);
                }

                _ = sleep_until(self.deadline) => {
                    let now = Instant::now();
                    let idle = now.duration_since(self.last_frame);
                    if idle >= self.idle_threshold {
                        warn!(
                            location = %self.connection.location(),
                            idle_ms = idle.as_millis() as u64,
                            "No frame within liveness window, forcing reconnect"
                        );
                        self.connection.reopen();
                        self.arm(now);
                        return Some(ConnectionEvent::Interrupted(StreamError::StaleConnection { idle }));
                    }
                    self.arm(now);
                }
            }
        }
    }
}
