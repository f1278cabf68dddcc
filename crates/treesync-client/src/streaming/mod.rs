//! Live synchronization over server-sent events
//!
//! The layers, bottom up:
//!
//! - [`FrameDecoder`] turns the event-stream wire format into [`EventFrame`]s
//! - an [`EventTransport`] opens one frame stream per request
//! - [`StreamConnection`] re-opens the stream whenever it fails or ends
//! - [`Watchdog`] re-opens it when keep-alives stop arriving
//! - [`LiveSubscription`] folds `put`/`patch` frames into a snapshot
//! - [`CachedMulticast`] shares one subscription between observers
//!
//! # Example
//!
//! ```no_run
//! use treesync_client::{Location, TreeSyncClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TreeSyncClient::new(None)?;
//! let location = Location::parse("https://example.firebaseio.com/rooms")?;
//!
//! let mut changes = client.subscribe(&location);
//! while let Some(change) = changes.next().await {
//!     match change {
//!         Ok(change) => println!("{}: {}", change.path, change.snapshot.value()),
//!         Err(e) => {
//!             eprintln!("Subscription failed: {}", e);
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod connection;
mod decoder;
mod multicast;
mod subscription;
mod transport;
mod types;
mod watchdog;

pub use connection::StreamConnection;
pub use decoder::{decode_frames, FrameDecoder};
pub use multicast::{CachedMulticast, Observer};
pub(crate) use multicast::WeakMulticast;
pub use subscription::LiveSubscription;
pub use transport::{EventTransport, FrameStream, HttpTransport};
pub use types::{
    ConnectionEvent, EventFrame, FrameKind, StreamError, StreamResult, SubscriptionState,
};
pub use watchdog::Watchdog;
