//! Change notifications emitted by live subscriptions

use std::sync::Arc;

use serde::Serialize;

use super::snapshot::Snapshot;

/// Which kind of change event produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Full replacement of the value at a path
    Put,
    /// Merge of child keys into the value at a path
    Patch,
}

/// A new snapshot of a live location
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    /// The snapshot after the change was applied
    pub snapshot: Arc<Snapshot>,
    /// Kind of the event that caused the change
    pub kind: ChangeKind,
    /// Path of the change, relative to the subscribed location
    pub path: String,
    /// Key of the previous sibling in query order.
    ///
    /// The stream protocol carries no ordering hints, so this is currently
    /// always `None`.
    pub previous_sibling_key: Option<String>,
}

impl ChangeNotification {
    /// Create a notification without ordering metadata
    pub fn new(snapshot: Arc<Snapshot>, kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            snapshot,
            kind,
            path: path.into(),
            previous_sibling_key: None,
        }
    }
}
