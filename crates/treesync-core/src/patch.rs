//! Snapshot patch engine
//!
//! Folds `put` (replace) and `patch` (merge) changes into a snapshot. Both
//! operations are pure: the input snapshot is never touched, and when the
//! change would not alter the tree the very same `Arc` is returned so callers
//! can detect no-ops with [`Arc::ptr_eq`].

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Map;
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::models::{ChangeKind, Snapshot};
use crate::value::{deep_equal, get_path, is_absent, prune, set_path, split_path, TreeValue};

/// A normalized change instruction, relative to a subscribed location
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Replace the value at `path`
    Put { path: String, value: TreeValue },
    /// Merge `children` into the value at `path`
    Merge {
        path: String,
        children: Map<String, TreeValue>,
    },
}

/// `put`/`patch` event payload as sent on the change stream
#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    #[serde(default)]
    data: TreeValue,
}

fn decode_payload(payload: &str) -> CoreResult<ChangePayload> {
    serde_json::from_str(payload).map_err(|e| {
        let preview: String = payload.chars().take(100).collect();
        CoreError::InvalidPayload(format!("{e} (data: {preview})"))
    })
}

impl PatchOp {
    /// Decode the payload of a `put` event
    pub fn decode_put(payload: &str) -> CoreResult<Self> {
        let ChangePayload { path, data } = decode_payload(payload)?;
        Ok(Self::Put { path, value: data })
    }

    /// Decode the payload of a `patch` event; `data` must be a mapping
    pub fn decode_merge(payload: &str) -> CoreResult<Self> {
        let ChangePayload { path, data } = decode_payload(payload)?;
        let children = match data {
            TreeValue::Object(map) => map,
            TreeValue::Null => Map::new(),
            other => {
                return Err(CoreError::InvalidPayload(format!(
                    "patch data at '{path}' must be an object, got {other}"
                )))
            }
        };
        Ok(Self::Merge { path, children })
    }

    /// Target path relative to the subscribed location
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Merge { path, .. } => path,
        }
    }

    /// Which change kind this op was decoded from
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Put { .. } => ChangeKind::Put,
            Self::Merge { .. } => ChangeKind::Patch,
        }
    }

    /// Apply the op to `snapshot`
    pub fn apply(self, snapshot: &Arc<Snapshot>) -> Arc<Snapshot> {
        match self {
            Self::Put { path, value } => apply_put(snapshot, &path, value),
            Self::Merge { path, children } => apply_patch(snapshot, &path, children),
        }
    }
}

/// Replace the value at `path`.
///
/// An empty or `/` path replaces the whole tree. Returns `snapshot` itself
/// when the value at `path` already deep-equals `value`.
pub fn apply_put(snapshot: &Arc<Snapshot>, path: &str, value: TreeValue) -> Arc<Snapshot> {
    let segments = split_path(path);

    let unchanged = match get_path(snapshot.value(), &segments) {
        Some(current) => deep_equal(current, &value),
        None => is_absent(&value),
    };
    if unchanged {
        trace!(path, "put is a no-op");
        return Arc::clone(snapshot);
    }

    let mut root = snapshot.value().clone();
    set_path(&mut root, &segments, value);
    rebuild(snapshot, root)
}

/// Merge `merge` into the value at `path`.
///
/// Keys may themselves be slash-delimited paths below `path`. Returns
/// `snapshot` itself when every key already deep-equals its existing child.
pub fn apply_patch(
    snapshot: &Arc<Snapshot>,
    path: &str,
    merge: Map<String, TreeValue>,
) -> Arc<Snapshot> {
    let segments = split_path(path);
    let target = get_path(snapshot.value(), &segments);

    let unchanged = merge.iter().all(|(key, value)| {
        match target.and_then(|node| get_path(node, &split_path(key))) {
            Some(existing) => deep_equal(existing, value),
            None => is_absent(value),
        }
    });
    if unchanged {
        trace!(path, keys = merge.len(), "patch is a no-op");
        return Arc::clone(snapshot);
    }

    let mut root = snapshot.value().clone();
    for (key, value) in merge {
        let mut child: Vec<&str> = segments.clone();
        child.extend(split_path(&key));
        set_path(&mut root, &child, value);
    }
    rebuild(snapshot, root)
}

fn rebuild(snapshot: &Snapshot, root: TreeValue) -> Arc<Snapshot> {
    let root = prune(root);
    Arc::new(Snapshot::new(snapshot.location().clone(), root))
}
