//! Table catalog boundary and the per-table replication switch.
//!
//! The catalog belongs to the storage engine. Peer administration only
//! reads it to expand "all tables" and "all families" scopes into the
//! families switched to global replication, and never uses it to reject a
//! filter. The replication switch is the one write:
//! it marks every family of a table as globally replicated or local.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AdminError;

/// Read-only view of the table catalog.
pub trait TableCatalog: Send + Sync {
    /// True if the table exists.
    fn table_exists(&self, name: &str) -> bool;

    /// All table names, sorted.
    fn list_tables(&self) -> Vec<String>;

    /// Families of a table; empty if the table does not exist.
    fn column_families_of(&self, table: &str) -> BTreeSet<String>;
}

/// Replication scope of a column family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationScope {
    /// Edits stay in the source cluster.
    #[default]
    Local,
    /// Edits are shipped to peers.
    Global,
}

/// Catalog operations used by the table replication switch.
pub trait TableCatalogAdmin: TableCatalog {
    /// Scope of each family of a table, or `None` if the table is missing.
    fn replication_scopes(&self, table: &str) -> Option<BTreeMap<String, ReplicationScope>>;

    /// Sets every family of a table to `scope`. Returns false if the table
    /// is missing.
    fn set_replication_scope(&self, table: &str, scope: ReplicationScope) -> bool;

    /// Families of a table switched to [`ReplicationScope::Global`]; empty
    /// if the table is missing.
    fn replicated_families(&self, table: &str) -> BTreeSet<String> {
        self.replication_scopes(table)
            .map(|scopes| {
                scopes
                    .into_iter()
                    .filter(|(_, scope)| *scope == ReplicationScope::Global)
                    .map(|(family, _)| family)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Sets every family of `table` to `scope`. Returns whether anything changed.
pub fn set_table_replication(
    catalog: &dyn TableCatalogAdmin,
    table: &str,
    scope: ReplicationScope,
) -> Result<bool, AdminError> {
    let scopes = catalog
        .replication_scopes(table)
        .ok_or_else(|| AdminError::NoSuchTable {
            table: table.to_string(),
        })?;
    if scopes.values().all(|s| *s == scope) {
        return Ok(false);
    }
    if !catalog.set_replication_scope(table, scope) {
        return Err(AdminError::NoSuchTable {
            table: table.to_string(),
        });
    }
    info!(table, ?scope, "table replication scope changed");
    Ok(true)
}

/// In-memory catalog.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<BTreeMap<String, BTreeMap<String, ReplicationScope>>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the given tables, every family local.
    pub fn with_tables(tables: &BTreeMap<String, Vec<String>>) -> Self {
        let catalog = Self::new();
        for (table, families) in tables {
            catalog.create_table(table, families.iter().map(String::as_str));
        }
        catalog
    }

    /// Loads a JSON snapshot, or seeds from `seed` when the file is absent.
    pub fn load_or_seed(
        file: &Path,
        seed: &BTreeMap<String, Vec<String>>,
    ) -> anyhow::Result<Self> {
        if !file.exists() {
            return Ok(Self::with_tables(seed));
        }
        let contents = std::fs::read_to_string(file)?;
        let tables = serde_json::from_str(&contents)?;
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Writes a JSON snapshot.
    pub fn save(&self, file: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&*self.tables.read())?;
        std::fs::write(file, json)?;
        Ok(())
    }

    /// Creates or replaces a table.
    pub fn create_table<'a>(&self, table: &str, families: impl IntoIterator<Item = &'a str>) {
        let families = families
            .into_iter()
            .map(|f| (f.to_string(), ReplicationScope::Local))
            .collect();
        self.tables.write().insert(table.to_string(), families);
    }

    /// Drops a table. Returns whether it existed.
    pub fn drop_table(&self, table: &str) -> bool {
        self.tables.write().remove(table).is_some()
    }

    /// Adds a family to an existing table.
    pub fn add_family(&self, table: &str, family: &str) -> bool {
        match self.tables.write().get_mut(table) {
            Some(families) => {
                families
                    .entry(family.to_string())
                    .or_insert(ReplicationScope::Local);
                true
            }
            None => false,
        }
    }

    /// Removes a family from a table.
    pub fn remove_family(&self, table: &str, family: &str) -> bool {
        self.tables
            .write()
            .get_mut(table)
            .map(|families| families.remove(family).is_some())
            .unwrap_or(false)
    }
}

impl TableCatalog for MemoryCatalog {
    fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    fn list_tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    fn column_families_of(&self, table: &str) -> BTreeSet<String> {
        self.tables
            .read()
            .get(table)
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl TableCatalogAdmin for MemoryCatalog {
    fn replication_scopes(&self, table: &str) -> Option<BTreeMap<String, ReplicationScope>> {
        self.tables.read().get(table).cloned()
    }

    fn set_replication_scope(&self, table: &str, scope: ReplicationScope) -> bool {
        match self.tables.write().get_mut(table) {
            Some(families) => {
                families.values_mut().for_each(|s| *s = scope);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog.create_table("t1", ["cf1", "cf2"]);
        catalog.create_table("t2", ["cf"]);
        catalog
    }

    #[test]
    fn test_read_view() {
        let c = catalog();
        assert!(c.table_exists("t1"));
        assert!(!c.table_exists("t3"));
        assert_eq!(c.list_tables(), vec!["t1", "t2"]);
        assert_eq!(c.column_families_of("t1").len(), 2);
        assert!(c.column_families_of("t3").is_empty());
    }

    #[test]
    fn test_schema_drift_helpers() {
        let c = catalog();
        assert!(c.add_family("t2", "extra"));
        assert!(c.remove_family("t1", "cf1"));
        assert!(!c.remove_family("t1", "cf1"));
        assert!(c.drop_table("t2"));
        assert!(!c.add_family("t2", "x"));
        assert_eq!(c.list_tables(), vec!["t1"]);
    }

    #[test]
    fn test_enable_table_replication() {
        let c = catalog();
        assert!(set_table_replication(&c, "t1", ReplicationScope::Global).unwrap());
        assert!(c
            .replication_scopes("t1")
            .unwrap()
            .values()
            .all(|s| *s == ReplicationScope::Global));
        assert!(!set_table_replication(&c, "t1", ReplicationScope::Global).unwrap());
        assert!(set_table_replication(&c, "t1", ReplicationScope::Local).unwrap());
    }

    #[test]
    fn test_replicated_families_follow_switch() {
        let c = catalog();
        assert!(c.replicated_families("t1").is_empty());
        set_table_replication(&c, "t1", ReplicationScope::Global).unwrap();
        assert_eq!(c.replicated_families("t1").len(), 2);
        c.add_family("t1", "late");
        assert_eq!(c.replicated_families("t1").len(), 2);
        set_table_replication(&c, "t1", ReplicationScope::Local).unwrap();
        assert!(c.replicated_families("t1").is_empty());
        assert!(c.replicated_families("missing").is_empty());
    }

    #[test]
    fn test_switch_missing_table() {
        let c = catalog();
        assert_eq!(
            set_table_replication(&c, "nope", ReplicationScope::Global).unwrap_err(),
            AdminError::NoSuchTable {
                table: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("catalog.json");

        let mut seed = BTreeMap::new();
        seed.insert("t1".to_string(), vec!["cf1".to_string()]);
        let c = MemoryCatalog::load_or_seed(&file, &seed).unwrap();
        set_table_replication(&c, "t1", ReplicationScope::Global).unwrap();
        c.save(&file).unwrap();

        let loaded = MemoryCatalog::load_or_seed(&file, &BTreeMap::new()).unwrap();
        assert_eq!(
            loaded.replication_scopes("t1").unwrap()["cf1"],
            ReplicationScope::Global
        );
    }
}
