//! treesync Client Library
//!
//! Keeps local snapshots of locations in a remote tree database current by
//! following the database's server-sent event stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use treesync_client::{Location, TreeSyncClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TreeSyncClient::new(None)?;
//!     let location = Location::parse("https://example.firebaseio.com/rooms/lobby")?;
//!
//!     // Every observer of a location shares one connection
//!     let mut changes = client.subscribe(&location);
//!     while let Some(change) = changes.next().await {
//!         let change = change?;
//!         println!("{}", change.snapshot.value());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-memory transport and an SSE test
//! server:
//!
//! ```rust,ignore
//! use treesync_client::testing::ChannelTransport;
//!
//! let transport = ChannelTransport::new();
//! let client = TreeSyncClient::with_transport(transport.clone(), StreamConfig::default());
//! let mut changes = client.subscribe(&location);
//! transport.wait_for_open(1).await.put("/", json!({"a": 1}));
//! ```

mod client;
pub mod config;
mod error;
pub mod streaming;
pub mod testing;

pub use client::{SharedChanges, TreeSyncClient};
pub use config::{ClientConfig, ConfigError, StreamConfig};
pub use error::{ClientError, Result};

// Re-export streaming types for convenience
pub use streaming::{LiveSubscription, Observer, StreamError, StreamResult, SubscriptionState};

// Re-export core types for convenience
pub use treesync_core::{ChangeKind, ChangeNotification, Location, Snapshot, TreeValue};
