//! Core types for replication peer administration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tablerep_coord::Version;

use crate::cluster_key::ClusterKey;
use crate::error::AdminError;

/// Separator between a column family and a qualifier in the storage format.
pub const QUALIFIER_SEPARATOR: char = ':';

/// Caller-chosen, immutable peer identifier.
///
/// Must be non-empty and must not contain `-` (the data plane uses it to
/// name recovered queues) or `/` (the store path separator).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Validates and wraps a peer id.
    pub fn new(id: &str) -> Result<Self, AdminError> {
        let invalid = |reason: &str| AdminError::InvalidPeerId {
            peer_id: id.to_string(),
            reason: reason.to_string(),
        };
        if id.is_empty() {
            return Err(invalid("empty"));
        }
        if id.contains('-') {
            return Err(invalid("must not contain '-'"));
        }
        if id.contains('/') {
            return Err(invalid("must not contain '/'"));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("must not contain whitespace"));
        }
        Ok(Self(id.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for PeerId {
    type Error = AdminError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

/// Whether a peer is currently shipping edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeerState {
    /// Shippers stream to the peer.
    Enabled,
    /// Shippers hold edits for the peer.
    Disabled,
}

impl PeerState {
    /// Maps the record flag to a state.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            PeerState::Enabled
        } else {
            PeerState::Disabled
        }
    }

    /// True for [`PeerState::Enabled`].
    pub fn is_enabled(self) -> bool {
        self == PeerState::Enabled
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::Enabled => f.pad("ENABLED"),
            PeerState::Disabled => f.pad("DISABLED"),
        }
    }
}

/// Table to column-family scoping of a peer.
///
/// A table mapped to an empty family set replicates every family of that
/// table. Tables not in the map are not replicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCfs(BTreeMap<String, BTreeSet<String>>);

impl TableCfs {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with all of its families.
    pub fn with_table(mut self, table: &str) -> Self {
        self.0.entry(table.to_string()).or_default();
        self
    }

    /// Adds a table restricted to the given families.
    pub fn with_families<I, S>(mut self, table: &str, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(table, families);
        self
    }

    /// Adds families for a table; an empty iterator means all families.
    /// Families for an existing table are merged.
    pub fn insert<I, S>(&mut self, table: &str, families: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.0.entry(table.to_string()).or_default();
        entry.extend(families.into_iter().map(Into::into));
    }

    /// True when no table is listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tables listed.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Families listed for a table. `Some(empty)` means all families.
    pub fn families(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.0.get(table)
    }

    /// Iterates tables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// Checks every table and family name.
    pub fn validate(&self) -> Result<(), AdminError> {
        for (table, families) in &self.0 {
            validate_name("table", table, &[QUALIFIER_SEPARATOR, ';', ','])?;
            for cf in families {
                validate_name("column family", cf, &[QUALIFIER_SEPARATOR, ';', ','])?;
            }
        }
        Ok(())
    }
}

fn validate_name(kind: &str, name: &str, forbidden: &[char]) -> Result<(), AdminError> {
    if name.is_empty() {
        return Err(AdminError::filter(format!("empty {} name", kind)));
    }
    if let Some(c) = name.chars().find(|c| forbidden.contains(c)) {
        return Err(AdminError::filter(format!(
            "{} name '{}' contains '{}'",
            kind, name, c
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AdminError::filter(format!(
            "{} name '{}' contains whitespace",
            kind, name
        )));
    }
    Ok(())
}

impl From<BTreeMap<String, BTreeSet<String>>> for TableCfs {
    fn from(map: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self(map)
    }
}

/// Which tables a peer replicates.
///
/// `Scoped` never holds an empty mapping: building a filter from an empty
/// mapping yields `AllTables`, the single representation of "no scoping".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PeerFilter {
    /// Every table and every column family.
    #[default]
    AllTables,
    /// Only the listed tables and families.
    Scoped(TableCfs),
}

impl PeerFilter {
    /// Canonical filter for a mapping.
    pub fn from_table_cfs(table_cfs: TableCfs) -> Self {
        if table_cfs.is_empty() {
            PeerFilter::AllTables
        } else {
            PeerFilter::Scoped(table_cfs)
        }
    }

    /// The mapping; empty for `AllTables`.
    pub fn table_cfs(&self) -> TableCfs {
        match self {
            PeerFilter::AllTables => TableCfs::new(),
            PeerFilter::Scoped(t) => t.clone(),
        }
    }

    /// True for `AllTables`.
    pub fn is_all_tables(&self) -> bool {
        matches!(self, PeerFilter::AllTables)
    }

    /// Checks names in a scoped filter.
    pub fn validate(&self) -> Result<(), AdminError> {
        match self {
            PeerFilter::AllTables => Ok(()),
            PeerFilter::Scoped(t) if t.is_empty() => Err(AdminError::filter(
                "scoped filter must list at least one table",
            )),
            PeerFilter::Scoped(t) => t.validate(),
        }
    }
}

impl From<TableCfs> for PeerFilter {
    fn from(t: TableCfs) -> Self {
        Self::from_table_cfs(t)
    }
}

/// A peer as stored in the coordination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Peer id.
    pub id: PeerId,
    /// Destination cluster.
    pub cluster_key: ClusterKey,
    /// Whether shippers stream to this peer.
    pub enabled: bool,
    /// Table scoping.
    pub filter: PeerFilter,
    /// Store version the record was read at.
    pub version: Version,
}

impl PeerRecord {
    /// The record's state.
    pub fn state(&self) -> PeerState {
        PeerState::from_enabled(self.enabled)
    }

    /// Summary for listings.
    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            id: self.id.clone(),
            cluster_key: self.cluster_key.clone(),
            enabled: self.enabled,
            filter: self.filter.clone(),
        }
    }
}

/// One row of [`list_peers`](crate::registry::PeerRegistry::list_peers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
    /// Peer id.
    pub id: PeerId,
    /// Destination cluster.
    pub cluster_key: ClusterKey,
    /// Whether shippers stream to this peer.
    pub enabled: bool,
    /// Table scoping.
    pub filter: PeerFilter,
}

/// Which families of a table a peer replicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyScope {
    /// Every family of the table, whatever the catalog holds.
    AllFamilies,
    /// Only these families.
    Families(BTreeSet<String>),
}

/// A peer's share in a replicated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReplication {
    /// The contributing peer.
    pub peer_id: PeerId,
    /// Whether that peer is enabled.
    pub enabled: bool,
    /// Families it replicates.
    pub scope: FamilyScope,
}

/// One row of the replicated-tables listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReplicationInfo {
    /// Table name.
    pub table: String,
    /// Union of replicated families, with "all families" scopes expanded
    /// from the catalog.
    pub column_families: BTreeSet<String>,
    /// Peers replicating the table, in peer id order.
    pub peers: Vec<PeerReplication>,
}
