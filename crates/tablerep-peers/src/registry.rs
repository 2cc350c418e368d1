//! Peer registry: create, remove, look up and list peers.
//!
//! Each peer lives at `<root>/peers/<id>`. Anything the data plane hangs
//! beneath that node (queue positions and the like) belongs to the peer and
//! is removed with it. The registry keeps no copies of records; every call
//! reads the store.

use tablerep_coord::{StoreClient, StoreError, Version};
use tracing::{debug, info, warn};

use crate::cluster_key::ClusterKey;
use crate::codec;
use crate::error::AdminError;
use crate::retry::RetryPolicy;
use crate::types::{PeerFilter, PeerId, PeerRecord, PeerState, PeerSummary};

/// Name of the node holding all peers under the replication root.
pub const PEERS_NODE: &str = "peers";

/// CRUD over peer records.
#[derive(Clone)]
pub struct PeerRegistry {
    client: StoreClient,
    peers_path: String,
    retry: RetryPolicy,
}

impl PeerRegistry {
    /// Registry rooted at `root` (e.g. `/hbase/replication`).
    pub fn new(client: StoreClient, root: &str) -> Self {
        Self {
            client,
            peers_path: tablerep_coord::path::join(root, PEERS_NODE),
            retry: RetryPolicy::default(),
        }
    }

    /// Retry policy for removals racing with nodes created under the peer.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Path of the node holding all peers.
    pub fn peers_path(&self) -> &str {
        &self.peers_path
    }

    /// Path of one peer's record.
    pub fn peer_path(&self, id: &PeerId) -> String {
        tablerep_coord::path::join(&self.peers_path, id.as_str())
    }

    /// The underlying store client.
    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    /// Registers a new, enabled peer.
    ///
    /// Uniqueness is decided by the store's atomic create, so two callers
    /// racing on the same id see exactly one success.
    pub fn add_peer(
        &self,
        id: &str,
        cluster_key: &str,
        filter: PeerFilter,
    ) -> Result<(), AdminError> {
        let id = PeerId::new(id)?;
        let cluster_key = ClusterKey::parse(cluster_key)?;
        filter.validate()?;

        let record = PeerRecord {
            id: id.clone(),
            cluster_key,
            enabled: true,
            filter,
            version: 0,
        };
        let data = codec::encode(&record)?;

        self.client.ensure_path(&self.peers_path)?;
        match self.client.create_if_absent(&self.peer_path(&id), data) {
            Ok(()) => {
                info!(peer_id = %id, cluster_key = %record.cluster_key, "added replication peer");
                Ok(())
            }
            Err(StoreError::AlreadyExists { .. }) => Err(AdminError::DuplicatePeer {
                peer_id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a peer, everything beneath it, and every watch on it.
    ///
    /// A node created under the peer while it is being removed makes the
    /// final delete fail; the subtree is then listed and deleted again, up
    /// to the retry policy's attempts.
    pub fn remove_peer(&self, id: &str) -> Result<(), AdminError> {
        let id = PeerId::new(id)?;
        let path = self.peer_path(&id);
        let deleted = self.retry.run(&id, || match self.client.delete_recursive(&path) {
            Ok(n) => Ok(Some(n)),
            Err(StoreError::NotEmpty { path: busy }) => {
                debug!(peer_id = %id, node = %busy, "node appeared during removal, retrying");
                Ok(None)
            }
            Err(StoreError::NotFound { .. }) => Err(AdminError::NoSuchPeer {
                peer_id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        })?;
        let watches = self.client.remove_watches(&path)?;
        info!(peer_id = %id, nodes = deleted, watches, "removed replication peer");
        Ok(())
    }

    /// Snapshot of all peers, ordered by id.
    ///
    /// Peers removed while the scan runs are skipped; records that fail to
    /// decode are logged and skipped.
    pub fn list_peers(&self) -> Result<Vec<PeerSummary>, AdminError> {
        Ok(self.scan()?.iter().map(PeerRecord::summary).collect())
    }

    /// Full records of all peers, ordered by id.
    pub fn scan(&self) -> Result<Vec<PeerRecord>, AdminError> {
        let children = match self.client.list_children(&self.peers_path) {
            Ok(c) => c,
            Err(StoreError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::with_capacity(children.len());
        for child in children {
            let name = tablerep_coord::path::basename(&child);
            let id = match PeerId::new(name) {
                Ok(id) => id,
                Err(e) => {
                    warn!(node = %child, error = %e, "skipping foreign node under peers");
                    continue;
                }
            };
            match self.load(&id) {
                Ok(record) => records.push(record),
                Err(AdminError::NoSuchPeer { .. }) => {}
                Err(AdminError::Corrupt { msg }) => {
                    warn!(peer_id = %id, error = %msg, "skipping undecodable peer record");
                }
                Err(e) => return Err(e),
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Current record of a peer.
    pub fn get_peer(&self, id: &str) -> Result<PeerRecord, AdminError> {
        self.load(&PeerId::new(id)?)
    }

    /// Whether a peer is enabled.
    pub fn get_peer_state(&self, id: &str) -> Result<PeerState, AdminError> {
        Ok(self.get_peer(id)?.state())
    }

    /// True if the peer exists.
    pub fn peer_exists(&self, id: &str) -> Result<bool, AdminError> {
        match self.get_peer(id) {
            Ok(_) => Ok(true),
            Err(AdminError::NoSuchPeer { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn load(&self, id: &PeerId) -> Result<PeerRecord, AdminError> {
        match self.client.read(&self.peer_path(id)) {
            Ok(node) => codec::decode(id.clone(), &node),
            Err(StoreError::NotFound { .. }) => Err(AdminError::NoSuchPeer {
                peer_id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `record` if the stored version is still `record.version`.
    ///
    /// `Ok(None)` means another writer got there first.
    pub(crate) fn store_if_unchanged(
        &self,
        record: &PeerRecord,
    ) -> Result<Option<Version>, AdminError> {
        let data = codec::encode(record)?;
        match self
            .client
            .compare_and_set(&self.peer_path(&record.id), data, record.version)
        {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::VersionMismatch { .. }) => Ok(None),
            Err(StoreError::NotFound { .. }) => Err(AdminError::NoSuchPeer {
                peer_id: record.id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
