//! In-process coordination store.
//!
//! Backed by a `BTreeMap` of path to versioned node behind a
//! `parking_lot::RwLock`. Lock acquisition is bounded by the operation
//! timeout, so a wedged writer surfaces as [`StoreError::Unavailable`]
//! instead of blocking the caller forever. The store can also be switched
//! unavailable to simulate a partition.
//!
//! Watch events are delivered while the write lock is held, so every
//! watcher sees a node's changes in version order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::path;
use crate::store::{CoordinationStore, EventKind, StoreEvent, Version, Versioned};
use crate::watch::WatchRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Node {
    data: Vec<u8>,
    version: Version,
}

/// On-disk form of a [`MemoryStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    nodes: BTreeMap<String, Node>,
}

/// In-memory [`CoordinationStore`]. Thread-safe.
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    watches: WatchRegistry,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::from_nodes(BTreeMap::new())
    }

    fn from_nodes(nodes: BTreeMap<String, Node>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
            watches: WatchRegistry::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Loads a store from a JSON snapshot. A missing file yields an empty store.
    pub fn load(file: &Path) -> Result<Self, StoreError> {
        if !file.exists() {
            debug!(file = %file.display(), "no snapshot, starting empty");
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(file)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        for p in snapshot.nodes.keys() {
            path::validate(p)?;
        }
        Ok(Self::from_nodes(snapshot.nodes))
    }

    /// Writes the current contents as a JSON snapshot.
    pub fn save(&self, file: &Path) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            nodes: self.nodes.read().clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(file, json)?;
        Ok(())
    }

    /// Switches the store on or off. While off every call fails with
    /// `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of nodes, excluding the implicit root.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Number of live watch subscriptions.
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                msg: "store is unreachable".to_string(),
            })
        }
    }

    fn read_lock(
        &self,
        timeout: Duration,
    ) -> Result<RwLockReadGuard<'_, BTreeMap<String, Node>>, StoreError> {
        self.check_available()?;
        self.nodes
            .try_read_for(timeout)
            .ok_or_else(|| StoreError::Unavailable {
                msg: format!("read timed out after {:?}", timeout),
            })
    }

    fn write_lock(
        &self,
        timeout: Duration,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Node>>, StoreError> {
        self.check_available()?;
        self.nodes
            .try_write_for(timeout)
            .ok_or_else(|| StoreError::Unavailable {
                msg: format!("write timed out after {:?}", timeout),
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn exists(nodes: &BTreeMap<String, Node>, p: &str) -> bool {
    p == "/" || nodes.contains_key(p)
}

fn children(nodes: &BTreeMap<String, Node>, p: &str) -> Vec<String> {
    let scan_from = if p == "/" {
        "/".to_string()
    } else {
        format!("{}/", p)
    };
    nodes
        .range::<String, _>(scan_from.clone()..)
        .take_while(|(k, _)| k.starts_with(&scan_from))
        .filter(|(k, _)| path::parent(k) == Some(p))
        .map(|(k, _)| k.clone())
        .collect()
}

impl CoordinationStore for MemoryStore {
    fn create_if_absent(
        &self,
        p: &str,
        data: Vec<u8>,
        timeout: Duration,
    ) -> Result<(), StoreError> {
        path::validate(p)?;
        let mut nodes = self.write_lock(timeout)?;
        if exists(&nodes, p) {
            return Err(StoreError::AlreadyExists {
                path: p.to_string(),
            });
        }
        let parent = path::parent(p).unwrap_or("/");
        if !exists(&nodes, parent) {
            return Err(StoreError::NotFound {
                path: parent.to_string(),
            });
        }
        nodes.insert(p.to_string(), Node { data, version: 0 });
        self.watches.notify(&StoreEvent {
            kind: EventKind::Created,
            path: p.to_string(),
            version: 0,
        });
        Ok(())
    }

    fn read(&self, p: &str, timeout: Duration) -> Result<Versioned, StoreError> {
        path::validate(p)?;
        let nodes = self.read_lock(timeout)?;
        nodes
            .get(p)
            .map(|n| Versioned {
                data: n.data.clone(),
                version: n.version,
            })
            .ok_or_else(|| StoreError::NotFound {
                path: p.to_string(),
            })
    }

    fn compare_and_set(
        &self,
        p: &str,
        data: Vec<u8>,
        expected_version: Version,
        timeout: Duration,
    ) -> Result<Version, StoreError> {
        path::validate(p)?;
        let mut nodes = self.write_lock(timeout)?;
        let node = nodes.get_mut(p).ok_or_else(|| StoreError::NotFound {
            path: p.to_string(),
        })?;
        if node.version != expected_version {
            return Err(StoreError::VersionMismatch {
                path: p.to_string(),
                expected: expected_version,
                actual: node.version,
            });
        }
        node.data = data;
        node.version += 1;
        let new_version = node.version;
        self.watches.notify(&StoreEvent {
            kind: EventKind::Updated,
            path: p.to_string(),
            version: new_version,
        });
        Ok(new_version)
    }

    fn delete(&self, p: &str, timeout: Duration) -> Result<(), StoreError> {
        path::validate(p)?;
        let mut nodes = self.write_lock(timeout)?;
        if !nodes.contains_key(p) {
            return Err(StoreError::NotFound {
                path: p.to_string(),
            });
        }
        if !children(&nodes, p).is_empty() {
            return Err(StoreError::NotEmpty {
                path: p.to_string(),
            });
        }
        let version = nodes.remove(p).map(|n| n.version).unwrap_or_default();
        self.watches.notify(&StoreEvent {
            kind: EventKind::Deleted,
            path: p.to_string(),
            version,
        });
        Ok(())
    }

    fn list_children(&self, prefix: &str, timeout: Duration) -> Result<Vec<String>, StoreError> {
        path::validate(prefix)?;
        let nodes = self.read_lock(timeout)?;
        if !exists(&nodes, prefix) {
            return Err(StoreError::NotFound {
                path: prefix.to_string(),
            });
        }
        Ok(children(&nodes, prefix))
    }

    fn watch(&self, prefix: &str, _timeout: Duration) -> Result<Receiver<StoreEvent>, StoreError> {
        path::validate(prefix)?;
        self.check_available()?;
        Ok(self.watches.subscribe(prefix))
    }

    fn remove_watches(&self, prefix: &str, _timeout: Duration) -> Result<usize, StoreError> {
        path::validate(prefix)?;
        self.check_available()?;
        Ok(self.watches.remove_under(prefix))
    }
}
