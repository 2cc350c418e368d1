//! Coordination store abstraction.
//!
//! The coordination store is the single source of truth for replication
//! configuration. Implementations must provide atomic create-if-absent,
//! versioned compare-and-set and change notification. Every call carries
//! the timeout the caller is willing to wait; an implementation that cannot
//! answer in time returns [`StoreError::Unavailable`] and the write must
//! not be assumed to have happened.

use std::time::Duration;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Compare-and-set token of a node. Starts at 0 on create.
pub type Version = i64;

/// A node value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// Raw node bytes.
    pub data: Vec<u8>,
    /// Version observed by the read.
    pub version: Version,
}

/// Kind of change delivered to a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A node was created.
    Created,
    /// A node's data changed.
    Updated,
    /// A node was deleted.
    Deleted,
}

/// A change notification for a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    /// What happened.
    pub kind: EventKind,
    /// Path of the node that changed.
    pub path: String,
    /// Version after the change (last known version for deletes).
    pub version: Version,
}

/// Strongly consistent, versioned key/value store with watches.
///
/// Nodes form a hierarchy: a node can only be created when its parent
/// exists (the root `/` always exists) and can only be deleted once it has
/// no children.
pub trait CoordinationStore: Send + Sync {
    /// Atomically create a node, failing with `AlreadyExists` if present.
    fn create_if_absent(
        &self,
        path: &str,
        data: Vec<u8>,
        timeout: Duration,
    ) -> Result<(), StoreError>;

    /// Read a node and its current version.
    fn read(&self, path: &str, timeout: Duration) -> Result<Versioned, StoreError>;

    /// Replace a node's data if it is still at `expected_version`.
    /// Returns the new version.
    fn compare_and_set(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_version: Version,
        timeout: Duration,
    ) -> Result<Version, StoreError>;

    /// Delete a node that has no children.
    fn delete(&self, path: &str, timeout: Duration) -> Result<(), StoreError>;

    /// Full paths of the immediate children of `prefix`, sorted.
    fn list_children(&self, prefix: &str, timeout: Duration) -> Result<Vec<String>, StoreError>;

    /// Subscribe to changes of `prefix` and every node beneath it.
    fn watch(&self, prefix: &str, timeout: Duration) -> Result<Receiver<StoreEvent>, StoreError>;

    /// Drop every subscription rooted at or beneath `prefix`.
    /// Returns how many subscriptions were removed.
    fn remove_watches(&self, prefix: &str, timeout: Duration) -> Result<usize, StoreError>;
}
