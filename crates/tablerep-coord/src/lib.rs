#![warn(missing_docs)]

//! tablerep coordination subsystem: typed client over a strongly consistent,
//! versioned key/value store with change notification

pub mod client;
pub mod error;
pub mod memory;
pub mod path;
pub mod store;
pub mod watch;

pub use client::{StoreClient, DEFAULT_TIMEOUT};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{CoordinationStore, EventKind, StoreEvent, Version, Versioned};
pub use watch::WatchRegistry;
