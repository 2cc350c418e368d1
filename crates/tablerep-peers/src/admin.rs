//! Single handle over every peer administration operation.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use regex::Regex;
use tablerep_coord::{CoordinationStore, StoreClient, StoreEvent};

use crate::catalog::{set_table_replication, ReplicationScope, TableCatalogAdmin};
use crate::config::AdminConfig;
use crate::controller::ReplicationController;
use crate::error::AdminError;
use crate::listing::ReplicationListing;
use crate::registry::PeerRegistry;
use crate::retry::RetryPolicy;
use crate::table_cfs::TableCfsManager;
use crate::types::{
    PeerFilter, PeerRecord, PeerState, PeerSummary, TableCfs, TableReplicationInfo,
};

/// Replication administration API.
///
/// Holds a store handle and a catalog handle only; all peer state is read
/// from the store on each call.
#[derive(Clone)]
pub struct ReplicationAdmin {
    registry: PeerRegistry,
    controller: ReplicationController,
    table_cfs: TableCfsManager,
    listing: ReplicationListing,
    catalog: Arc<dyn TableCatalogAdmin>,
}

impl ReplicationAdmin {
    /// Builds the API from explicit parts.
    pub fn new<C>(client: StoreClient, root: &str, retry: RetryPolicy, catalog: Arc<C>) -> Self
    where
        C: TableCatalogAdmin + 'static,
    {
        let registry = PeerRegistry::new(client, root).with_retry(retry.clone());
        Self {
            controller: ReplicationController::new(registry.clone(), retry.clone()),
            table_cfs: TableCfsManager::new(registry.clone(), retry),
            listing: ReplicationListing::new(registry.clone(), catalog.clone()),
            registry,
            catalog,
        }
    }

    /// Builds the API from a config.
    pub fn from_config<C>(
        config: &AdminConfig,
        store: Arc<dyn CoordinationStore>,
        catalog: Arc<C>,
    ) -> Self
    where
        C: TableCatalogAdmin + 'static,
    {
        let client = StoreClient::with_timeout(store, config.op_timeout());
        Self::new(client, &config.store_root, config.retry.clone(), catalog)
    }

    /// Registers a peer; it starts enabled.
    pub fn add_peer(
        &self,
        id: &str,
        cluster_key: &str,
        filter: PeerFilter,
    ) -> Result<(), AdminError> {
        self.registry.add_peer(id, cluster_key, filter)
    }

    /// Removes a peer and everything attached to it.
    pub fn remove_peer(&self, id: &str) -> Result<(), AdminError> {
        self.registry.remove_peer(id)
    }

    /// All peers, ordered by id.
    pub fn list_peers(&self) -> Result<Vec<PeerSummary>, AdminError> {
        self.registry.list_peers()
    }

    /// A peer's full record.
    pub fn get_peer(&self, id: &str) -> Result<PeerRecord, AdminError> {
        self.registry.get_peer(id)
    }

    /// Whether a peer is enabled.
    pub fn get_peer_state(&self, id: &str) -> Result<PeerState, AdminError> {
        self.controller.get_peer_state(id)
    }

    /// Resumes shipping to a peer.
    pub fn enable_peer(&self, id: &str) -> Result<(), AdminError> {
        self.controller.enable_peer(id)
    }

    /// Stops shipping to a peer.
    pub fn disable_peer(&self, id: &str) -> Result<(), AdminError> {
        self.controller.disable_peer(id)
    }

    /// A peer's filter.
    pub fn get_filter(&self, id: &str) -> Result<PeerFilter, AdminError> {
        self.table_cfs.get_filter(id)
    }

    /// Replaces a peer's filter.
    pub fn set_filter(&self, id: &str, filter: PeerFilter) -> Result<(), AdminError> {
        self.table_cfs.set_filter(id, filter).map(|_| ())
    }

    /// Replaces a peer's filter from a mapping; empty resets to all tables.
    pub fn set_table_cfs(&self, id: &str, table_cfs: TableCfs) -> Result<(), AdminError> {
        self.table_cfs.set_table_cfs(id, table_cfs).map(|_| ())
    }

    /// Replaces a peer's filter from `t1:cf1,cf2;t2` text.
    pub fn set_peer_table_cfs(&self, id: &str, text: &str) -> Result<(), AdminError> {
        self.table_cfs.set_table_cfs_str(id, text).map(|_| ())
    }

    /// A peer's filter as `t1:cf1,cf2;t2` text.
    pub fn show_peer_table_cfs(&self, id: &str) -> Result<String, AdminError> {
        self.table_cfs.show_table_cfs(id)
    }

    /// Replicated tables matching `pattern`.
    pub fn list_replicated_tables(
        &self,
        pattern: &Regex,
    ) -> Result<Vec<TableReplicationInfo>, AdminError> {
        self.listing.list_replicated_tables(pattern)
    }

    /// Marks every family of `table` as replicated. Returns whether
    /// anything changed.
    pub fn enable_table_replication(&self, table: &str) -> Result<bool, AdminError> {
        set_table_replication(self.catalog.as_ref(), table, ReplicationScope::Global)
    }

    /// Marks every family of `table` as local. Returns whether anything
    /// changed.
    pub fn disable_table_replication(&self, table: &str) -> Result<bool, AdminError> {
        set_table_replication(self.catalog.as_ref(), table, ReplicationScope::Local)
    }

    /// Change feed for every peer record and the nodes beneath them.
    pub fn watch_peers(&self) -> Result<Receiver<StoreEvent>, AdminError> {
        Ok(self.registry.client().watch(self.registry.peers_path())?)
    }
}
