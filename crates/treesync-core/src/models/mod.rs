//! Data models for live tree synchronization

pub mod change;
pub mod location;
pub mod snapshot;

pub use change::*;
pub use location::*;
pub use snapshot::*;
