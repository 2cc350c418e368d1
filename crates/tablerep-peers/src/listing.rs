//! Read-only aggregation of which tables are replicated, and to whom.
//!
//! Each peer's filter is read independently; there is no cross-peer
//! snapshot. "All families" scopes cover only the families the catalog has
//! switched to global replication, so a peer replicating every table lists
//! just the tables with at least one such family. Tables named explicitly
//! in a filter are listed whether or not the catalog still has them.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use crate::catalog::TableCatalogAdmin;
use crate::error::AdminError;
use crate::registry::PeerRegistry;
use crate::types::{FamilyScope, PeerFilter, PeerReplication, TableReplicationInfo};

/// Composite read queries over all peers.
#[derive(Clone)]
pub struct ReplicationListing {
    registry: PeerRegistry,
    catalog: Arc<dyn TableCatalogAdmin>,
}

impl ReplicationListing {
    /// Listing over `registry`, expanding scopes with `catalog`.
    pub fn new(registry: PeerRegistry, catalog: Arc<dyn TableCatalogAdmin>) -> Self {
        Self { registry, catalog }
    }

    /// Every replicated table whose name matches `pattern`, in name order,
    /// with the peers replicating it.
    pub fn list_replicated_tables(
        &self,
        pattern: &Regex,
    ) -> Result<Vec<TableReplicationInfo>, AdminError> {
        let mut tables: BTreeMap<String, TableReplicationInfo> = BTreeMap::new();

        for record in self.registry.scan()? {
            let scoped: Vec<(String, FamilyScope)> = match &record.filter {
                PeerFilter::AllTables => self
                    .catalog
                    .list_tables()
                    .into_iter()
                    .filter(|t| !self.catalog.replicated_families(t).is_empty())
                    .map(|t| (t, FamilyScope::AllFamilies))
                    .collect(),
                PeerFilter::Scoped(table_cfs) => table_cfs
                    .iter()
                    .map(|(table, families)| {
                        let scope = if families.is_empty() {
                            FamilyScope::AllFamilies
                        } else {
                            FamilyScope::Families(families.clone())
                        };
                        (table.clone(), scope)
                    })
                    .collect(),
            };

            for (table, scope) in scoped {
                if !pattern.is_match(&table) {
                    continue;
                }
                let info = tables
                    .entry(table.clone())
                    .or_insert_with(|| TableReplicationInfo {
                        table: table.clone(),
                        column_families: Default::default(),
                        peers: Vec::new(),
                    });
                match &scope {
                    FamilyScope::AllFamilies => info
                        .column_families
                        .extend(self.catalog.replicated_families(&table)),
                    FamilyScope::Families(families) => {
                        info.column_families.extend(families.iter().cloned())
                    }
                }
                info.peers.push(PeerReplication {
                    peer_id: record.id.clone(),
                    enabled: record.enabled,
                    scope,
                });
            }
        }

        Ok(tables.into_values().collect())
    }
}
