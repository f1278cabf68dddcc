//! treesync client implementation

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument};
use treesync_core::{ChangeNotification, Location};

use crate::config::{ClientConfig, StreamConfig};
use crate::error::Result;
use crate::streaming::{
    CachedMulticast, EventTransport, HttpTransport, LiveSubscription, Observer, StreamResult,
    WeakMulticast,
};

/// Shared change stream for one location
pub type SharedChanges = CachedMulticast<StreamResult<ChangeNotification>>;

/// Live synchronization client
///
/// Subscriptions to the same location made through one client (or its
/// clones) share a single connection. A location is only tracked while a
/// handle or observer for it is alive.
#[derive(Clone)]
pub struct TreeSyncClient {
    transport: Arc<dyn EventTransport>,
    config: StreamConfig,
    live: Arc<Mutex<HashMap<Location, WeakMulticast<StreamResult<ChangeNotification>>>>>,
}

impl TreeSyncClient {
    /// Create a client with default timings
    ///
    /// # Arguments
    /// * `auth` - Credential sent with every stream request, if any
    pub fn new(auth: Option<String>) -> Result<Self> {
        Self::from_config(&ClientConfig {
            auth,
            ..ClientConfig::default()
        })
    }

    /// Create a client from a configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.stream.connect_timeout(), config.auth.clone())?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.stream.clone(),
        ))
    }

    /// Create a client from a YAML configuration file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = ClientConfig::from_yaml_file(path)?;
        Self::from_config(&config)
    }

    /// Create a client over a custom transport
    pub fn with_transport(transport: Arc<dyn EventTransport>, config: StreamConfig) -> Self {
        Self {
            transport,
            config,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Stream timings used for new subscriptions
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Create an unshared subscription to `location`
    #[instrument(skip(self), fields(location = %location))]
    pub fn connect(&self, location: &Location) -> LiveSubscription {
        debug!("Creating unshared subscription");
        LiveSubscription::new(Arc::clone(&self.transport), location.clone(), &self.config)
    }

    /// Shared change stream for `location`.
    ///
    /// The connection is opened when the first observer attaches and closed
    /// when the last one detaches.
    #[instrument(skip(self), fields(location = %location))]
    pub fn watch(&self, location: &Location) -> SharedChanges {
        let mut live = self.live.lock();
        if let Some(shared) = live.get(location).and_then(WeakMulticast::upgrade) {
            return shared;
        }
        live.retain(|_, shared| !shared.is_dropped());

        debug!("Creating shared subscription");
        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        let target = location.clone();
        let shared = CachedMulticast::new(move || {
            LiveSubscription::new(Arc::clone(&transport), target.clone(), &config).into_stream()
        });
        live.insert(location.clone(), shared.downgrade());
        shared
    }

    /// Attach a new observer to the shared change stream for `location`.
    ///
    /// If the location already has a value it is delivered first. Dropping
    /// the observer detaches it. Must be called within a Tokio runtime.
    pub fn subscribe(&self, location: &Location) -> Observer<StreamResult<ChangeNotification>> {
        self.watch(location).attach()
    }
}

impl std::fmt::Debug for TreeSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeSyncClient")
            .field("config", &self.config)
            .field("locations", &self.live.lock().len())
            .finish()
    }
}
