//! treesync-core - Core types for live tree synchronization
//!
//! This crate holds the pure, I/O-free half of treesync: addressable
//! [`Location`]s, immutable [`Snapshot`]s of remote tree values, and the patch
//! engine that folds `put`/`patch` change events into a new snapshot.

pub mod error;
pub mod models;
pub mod patch;
pub mod value;

pub use error::{CoreError, CoreResult};
pub use models::*;
pub use patch::{apply_patch, apply_put, PatchOp};
pub use value::{deep_equal, TreeValue};
