//! Per-peer table/column-family scoping.
//!
//! Filters are replaced whole, with the same versioned read-modify-write
//! and retry as state changes. Validation never consults the table catalog:
//! a filter may name tables or families that do not exist (yet, or any
//! more).
//!
//! The text form used by operators is `t1:cf1,cf2;t2`: entries separated by
//! `;`, a table and its families by `:`, families by `,`. A table without a
//! family list replicates all of its families.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::AdminError;
use crate::registry::PeerRegistry;
use crate::retry::RetryPolicy;
use crate::types::{PeerFilter, PeerId, TableCfs, QUALIFIER_SEPARATOR};

/// Parses the text form. Blank input yields an empty mapping.
pub fn parse_table_cfs(text: &str) -> Result<TableCfs, AdminError> {
    let mut table_cfs = TableCfs::new();
    for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.split(QUALIFIER_SEPARATOR);
        let table = parts.next().unwrap_or_default().trim();
        let families = parts.next();
        if parts.next().is_some() {
            return Err(AdminError::filter(format!(
                "entry '{}' has more than one '{}'",
                entry, QUALIFIER_SEPARATOR
            )));
        }
        if table.is_empty() {
            return Err(AdminError::filter(format!(
                "entry '{}' has no table name",
                entry
            )));
        }
        let families: Vec<&str> = families
            .map(|f| f.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
            .unwrap_or_default();
        table_cfs.insert(table, families);
    }
    table_cfs.validate()?;
    Ok(table_cfs)
}

/// Renders the text form, tables and families in name order.
pub fn format_table_cfs(table_cfs: &TableCfs) -> String {
    table_cfs
        .iter()
        .map(|(table, families)| {
            if families.is_empty() {
                table.clone()
            } else {
                let families: Vec<&str> = families.iter().map(String::as_str).collect();
                format!("{}{}{}", table, QUALIFIER_SEPARATOR, families.join(","))
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

impl FromStr for TableCfs {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_table_cfs(s)
    }
}

impl fmt::Display for TableCfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_table_cfs(self))
    }
}

/// Reads and replaces peer filters.
#[derive(Clone)]
pub struct TableCfsManager {
    registry: PeerRegistry,
    retry: RetryPolicy,
}

impl TableCfsManager {
    /// Manager over `registry` using `retry` for lost races.
    pub fn new(registry: PeerRegistry, retry: RetryPolicy) -> Self {
        Self { registry, retry }
    }

    /// The peer's filter.
    pub fn get_filter(&self, id: &str) -> Result<PeerFilter, AdminError> {
        Ok(self.registry.get_peer(id)?.filter)
    }

    /// Replaces the peer's filter. Returns whether the record was rewritten.
    ///
    /// Invalid filters are rejected before anything is read or written.
    pub fn set_filter(&self, id: &str, filter: PeerFilter) -> Result<bool, AdminError> {
        let id = PeerId::new(id)?;
        filter.validate()?;

        let changed = self.retry.run(&id, || {
            let mut record = self.registry.load(&id)?;
            if record.filter == filter {
                debug!(peer_id = %id, "filter unchanged");
                return Ok(Some(false));
            }
            record.filter = filter.clone();
            Ok(self.registry.store_if_unchanged(&record)?.map(|_| true))
        })?;

        if changed {
            info!(
                peer_id = %id,
                table_cfs = %filter.table_cfs(),
                "replication peer table-cfs changed"
            );
        }
        Ok(changed)
    }

    /// Replaces the filter from a mapping; an empty mapping resets the peer
    /// to replicate every table.
    pub fn set_table_cfs(&self, id: &str, table_cfs: TableCfs) -> Result<bool, AdminError> {
        self.set_filter(id, PeerFilter::from_table_cfs(table_cfs))
    }

    /// Replaces the filter from the text form.
    pub fn set_table_cfs_str(&self, id: &str, text: &str) -> Result<bool, AdminError> {
        self.set_table_cfs(id, parse_table_cfs(text)?)
    }

    /// The filter in text form; empty when every table is replicated.
    pub fn show_table_cfs(&self, id: &str) -> Result<String, AdminError> {
        Ok(format_table_cfs(&self.get_filter(id)?.table_cfs()))
    }
}
