//! Command implementations for the treesync CLI

pub mod get;
pub mod watch;

pub use get::get;
pub use watch::watch;
