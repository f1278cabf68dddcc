//! Replay-latest multicast over a restartable source
//!
//! One source is shared by every attached [`Observer`]. The source is
//! started by the first attach and stopped when the last observer is
//! dropped. An observer attaching to a running source is handed the most
//! recent value before anything else.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Most recent value seen by the running source
#[derive(Debug, Clone)]
enum Latest<T> {
    NoValue,
    HasValue(T),
}

struct MulticastState<T> {
    latest: Latest<T>,
    observers: HashMap<u64, mpsc::UnboundedSender<T>>,
    driver: Option<JoinHandle<()>>,
    /// Bumped on every start and stop so a stale driver never publishes
    generation: u64,
    next_id: u64,
}

type SourceFactory<T> = Box<dyn Fn() -> BoxStream<'static, T> + Send + Sync>;

struct Shared<T> {
    state: Mutex<MulticastState<T>>,
    factory: SourceFactory<T>,
}

/// Shares one source between any number of observers, replaying the latest
/// value to each observer as it attaches.
///
/// Cloning yields another handle to the same multicast.
pub struct CachedMulticast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CachedMulticast<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> CachedMulticast<T>
where
    T: Clone + Send + 'static,
{
    /// Create a multicast; `factory` is called to start a fresh source on
    /// each first attach
    pub fn new<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MulticastState {
                    latest: Latest::NoValue,
                    observers: HashMap::new(),
                    driver: None,
                    generation: 0,
                    next_id: 0,
                }),
                factory: Box::new(move || factory().boxed()),
            }),
        }
    }

    /// Attach a new observer.
    ///
    /// If a value has already been seen it is queued for the observer before
    /// this returns. Must be called within a Tokio runtime.
    pub fn attach(&self) -> Observer<T> {
        let mut state = self.shared.state.lock();

        let id = state.next_id;
        state.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Latest::HasValue(value) = &state.latest {
            let _ = tx.send(value.clone());
        }
        state.observers.insert(id, tx);

        if state.driver.is_none() {
            state.generation += 1;
            let generation = state.generation;
            debug!(generation, "Starting shared source");
            state.driver = Some(tokio::spawn(drive(Arc::clone(&self.shared), generation)));
        }

        Observer {
            id,
            rx,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of attached observers
    pub fn observer_count(&self) -> usize {
        self.shared.state.lock().observers.len()
    }

    /// The most recent value of the running source
    pub fn latest(&self) -> Option<T> {
        match &self.shared.state.lock().latest {
            Latest::HasValue(value) => Some(value.clone()),
            Latest::NoValue => None,
        }
    }

    /// Whether the source is currently running
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().driver.is_some()
    }
}

impl<T> CachedMulticast<T> {
    /// Non-owning handle that does not keep the multicast alive
    pub(crate) fn downgrade(&self) -> WeakMulticast<T> {
        WeakMulticast {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

/// Weak counterpart of [`CachedMulticast`]; observers and handles keep the
/// multicast alive, this does not
pub(crate) struct WeakMulticast<T> {
    shared: Weak<Shared<T>>,
}

impl<T> WeakMulticast<T> {
    pub(crate) fn upgrade(&self) -> Option<CachedMulticast<T>> {
        self.shared.upgrade().map(|shared| CachedMulticast { shared })
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.shared.strong_count() == 0
    }
}

impl<T> std::fmt::Debug for CachedMulticast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CachedMulticast")
            .field("observers", &state.observers.len())
            .field("running", &state.driver.is_some())
            .field("has_value", &matches!(state.latest, Latest::HasValue(_)))
            .finish()
    }
}

/// Pull items from a fresh source and broadcast them until the source ends
/// or the driver is stopped
async fn drive<T>(shared: Arc<Shared<T>>, generation: u64)
where
    T: Clone + Send + 'static,
{
    let mut source = (shared.factory)();

    while let Some(item) = source.next().await {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state
            .observers
            .retain(|_, tx| tx.send(item.clone()).is_ok());
        state.latest = Latest::HasValue(item);
    }

    let mut state = shared.state.lock();
    if state.generation == generation {
        debug!(generation, "Shared source ended");
        // Dropping the senders ends every observer's stream
        state.observers.clear();
        state.latest = Latest::NoValue;
        state.driver = None;
    }
}

/// One attached consumer of a [`CachedMulticast`].
///
/// Dropping the last observer stops the shared source.
pub struct Observer<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Observer<T> {
    /// Receive the next value; `None` once the source has ended
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

// Never pin-projected
impl<T> Unpin for Observer<T> {}

impl<T> Stream for Observer<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for Observer<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.observers.remove(&self.id);

        if state.observers.is_empty() {
            if let Some(driver) = state.driver.take() {
                debug!(generation = state.generation, "Last observer detached, stopping source");
                driver.abort();
            }
            state.generation += 1;
            state.latest = Latest::NoValue;
        }
    }
}

impl<T> std::fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer").field("id", &self.id).finish()
    }
}
