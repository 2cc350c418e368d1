//! Typed client over a [`CoordinationStore`].
//!
//! Holds only a store handle and the per-call timeout; it never caches node
//! contents, so every call observes the store as it is now.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::error::StoreError;
use crate::path;
use crate::store::{CoordinationStore, StoreEvent, Version, Versioned};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Store handle with a fixed operation timeout.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn CoordinationStore>,
    timeout: Duration,
}

impl StoreClient {
    /// Wraps a store using [`DEFAULT_TIMEOUT`].
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_timeout(store, DEFAULT_TIMEOUT)
    }

    /// Wraps a store with an explicit per-call timeout.
    pub fn with_timeout(store: Arc<dyn CoordinationStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// See [`CoordinationStore::create_if_absent`].
    pub fn create_if_absent(&self, p: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.store.create_if_absent(p, data, self.timeout)
    }

    /// See [`CoordinationStore::read`].
    pub fn read(&self, p: &str) -> Result<Versioned, StoreError> {
        self.store.read(p, self.timeout)
    }

    /// Like [`read`](Self::read) but maps `NotFound` to `None`.
    pub fn read_opt(&self, p: &str) -> Result<Option<Versioned>, StoreError> {
        match self.read(p) {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// See [`CoordinationStore::compare_and_set`].
    pub fn compare_and_set(
        &self,
        p: &str,
        data: Vec<u8>,
        expected_version: Version,
    ) -> Result<Version, StoreError> {
        self.store
            .compare_and_set(p, data, expected_version, self.timeout)
    }

    /// See [`CoordinationStore::delete`].
    pub fn delete(&self, p: &str) -> Result<(), StoreError> {
        self.store.delete(p, self.timeout)
    }

    /// See [`CoordinationStore::list_children`].
    pub fn list_children(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.store.list_children(prefix, self.timeout)
    }

    /// See [`CoordinationStore::watch`].
    pub fn watch(&self, prefix: &str) -> Result<Receiver<StoreEvent>, StoreError> {
        self.store.watch(prefix, self.timeout)
    }

    /// See [`CoordinationStore::remove_watches`].
    pub fn remove_watches(&self, prefix: &str) -> Result<usize, StoreError> {
        self.store.remove_watches(prefix, self.timeout)
    }

    /// Creates `p` and any missing ancestors with empty data.
    /// Nodes that already exist are left alone.
    pub fn ensure_path(&self, p: &str) -> Result<(), StoreError> {
        path::validate(p)?;
        if p == "/" {
            return Ok(());
        }
        let mut current = String::new();
        for segment in p[1..].split(path::SEPARATOR) {
            current = path::join(if current.is_empty() { "/" } else { &current }, segment);
            match self.create_if_absent(&current, Vec::new()) {
                Ok(()) => debug!(path = %current, "created node"),
                Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Deletes every node beneath `p`, deepest first, then `p` itself.
    ///
    /// Returns the number of nodes deleted. Nodes that vanish concurrently
    /// are skipped; a missing `p` is reported as `NotFound`.
    pub fn delete_recursive(&self, p: &str) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for child in self.list_children(p)? {
            match self.delete_recursive(&child) {
                Ok(n) => deleted += n,
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.delete(p)?;
        Ok(deleted + 1)
    }
}
