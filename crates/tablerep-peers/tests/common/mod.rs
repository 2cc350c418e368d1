//! Common test utilities and fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tablerep_coord::{
    CoordinationStore, MemoryStore, StoreError, StoreEvent, Version, Versioned,
};
use tablerep_peers::{MemoryCatalog, ReplicationAdmin, RetryPolicy};

/// Replication root used by every fixture.
pub const ROOT: &str = "/hbase/replication";

/// Fast timeout for in-process stores.
pub const TIMEOUT: Duration = Duration::from_millis(200);

type Rewrite = Box<dyn Fn(&str, &[u8]) -> Vec<u8> + Send + Sync>;

/// Store wrapper that lets a competing writer win the next N
/// compare-and-set rounds.
///
/// Before each intercepted CAS the competitor rewrites the node (through
/// `rewrite`, or with unchanged bytes), bumping its version so the
/// caller's write loses. Deletes can likewise be made to find a new child.
pub struct InterferingStore {
    pub inner: MemoryStore,
    pending: AtomicU32,
    rewrite: Mutex<Option<Rewrite>>,
    competing_writes: AtomicU32,
    growing: Mutex<Option<(String, u32)>>,
    late_children: AtomicU32,
}

impl InterferingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            pending: AtomicU32::new(0),
            rewrite: Mutex::new(None),
            competing_writes: AtomicU32::new(0),
            growing: Mutex::new(None),
            late_children: AtomicU32::new(0),
        }
    }

    /// The next `n` deletes of `parent` each find a freshly created child
    /// under it, as if a worker registered beneath the node mid-removal.
    pub fn grow_during_delete(&self, parent: &str, n: u32) {
        *self.growing.lock() = Some((parent.to_string(), n));
    }

    /// How many children were created by `grow_during_delete`.
    pub fn late_children(&self) -> u32 {
        self.late_children.load(Ordering::SeqCst)
    }

    fn grow(&self, path: &str, timeout: Duration) -> Result<(), StoreError> {
        {
            let mut growing = self.growing.lock();
            match growing.as_mut() {
                Some((parent, n)) if parent.as_str() == path && *n > 0 => *n -= 1,
                _ => return Ok(()),
            }
        }
        let k = self.late_children.fetch_add(1, Ordering::SeqCst);
        self.inner
            .create_if_absent(&format!("{}/late{}", path, k), Vec::new(), timeout)
    }

    /// Lose the next `n` compare-and-set rounds.
    pub fn interfere(&self, n: u32) {
        self.pending.store(n, Ordering::SeqCst);
    }

    /// What the competitor writes, given the path and current bytes.
    pub fn set_rewrite<F>(&self, f: F)
    where
        F: Fn(&str, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        *self.rewrite.lock() = Some(Box::new(f));
    }

    /// How many competing writes landed.
    pub fn competing_writes(&self) -> u32 {
        self.competing_writes.load(Ordering::SeqCst)
    }

    fn compete(&self, path: &str, timeout: Duration) -> Result<(), StoreError> {
        let take = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if take.is_err() {
            return Ok(());
        }
        let current = self.inner.read(path, timeout)?;
        let data = match self.rewrite.lock().as_ref() {
            Some(f) => f(path, &current.data),
            None => current.data.clone(),
        };
        self.inner
            .compare_and_set(path, data, current.version, timeout)?;
        self.competing_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl CoordinationStore for InterferingStore {
    fn create_if_absent(
        &self,
        path: &str,
        data: Vec<u8>,
        timeout: Duration,
    ) -> Result<(), StoreError> {
        self.inner.create_if_absent(path, data, timeout)
    }

    fn read(&self, path: &str, timeout: Duration) -> Result<Versioned, StoreError> {
        self.inner.read(path, timeout)
    }

    fn compare_and_set(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_version: Version,
        timeout: Duration,
    ) -> Result<Version, StoreError> {
        self.compete(path, timeout)?;
        self.inner
            .compare_and_set(path, data, expected_version, timeout)
    }

    fn delete(&self, path: &str, timeout: Duration) -> Result<(), StoreError> {
        self.grow(path, timeout)?;
        self.inner.delete(path, timeout)
    }

    fn list_children(&self, prefix: &str, timeout: Duration) -> Result<Vec<String>, StoreError> {
        self.inner.list_children(prefix, timeout)
    }

    fn watch(&self, prefix: &str, timeout: Duration) -> Result<Receiver<StoreEvent>, StoreError> {
        self.inner.watch(prefix, timeout)
    }

    fn remove_watches(&self, prefix: &str, timeout: Duration) -> Result<usize, StoreError> {
        self.inner.remove_watches(prefix, timeout)
    }
}

/// Catalog with two tables.
pub fn catalog() -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.create_table("t1", ["cf1", "cf2"]);
    catalog.create_table("t2", ["cf"]);
    catalog
}

/// Admin over a fresh in-memory store.
pub fn admin(retry: RetryPolicy) -> (Arc<MemoryStore>, ReplicationAdmin) {
    let store = Arc::new(MemoryStore::new());
    let admin = admin_over(store.clone(), retry, catalog());
    (store, admin)
}

/// Admin over an arbitrary store.
pub fn admin_over(
    store: Arc<dyn CoordinationStore>,
    retry: RetryPolicy,
    catalog: Arc<MemoryCatalog>,
) -> ReplicationAdmin {
    let client = tablerep_coord::StoreClient::with_timeout(store, TIMEOUT);
    ReplicationAdmin::new(client, ROOT, retry, catalog)
}

/// Path of a peer record.
pub fn peer_path(id: &str) -> String {
    format!("{}/peers/{}", ROOT, id)
}
