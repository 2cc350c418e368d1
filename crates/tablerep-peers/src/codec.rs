//! Peer record serialization.
//!
//! A record is stored as a JSON object at the peer's path:
//!
//! ```json
//! {"cluster_key": "zk:2181:/hbase", "state": "ENABLED", "table_cfs": "t1:cf1,cf2;t2"}
//! ```
//!
//! `table_cfs` is omitted when the peer replicates every table. An explicit
//! empty `table_cfs` is never written and is rejected on read, so absent and
//! empty cannot alias. The store version is not part of the value.

use serde::{Deserialize, Serialize};
use tablerep_coord::Versioned;

use crate::cluster_key::ClusterKey;
use crate::error::AdminError;
use crate::table_cfs::{format_table_cfs, parse_table_cfs};
use crate::types::{PeerFilter, PeerId, PeerRecord, PeerState};

#[derive(Debug, Serialize, Deserialize)]
struct StoredPeer {
    cluster_key: String,
    state: PeerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table_cfs: Option<String>,
}

/// Serializes the persistent fields of a record.
pub fn encode(record: &PeerRecord) -> Result<Vec<u8>, AdminError> {
    let table_cfs = match &record.filter {
        PeerFilter::AllTables => None,
        PeerFilter::Scoped(t) if t.is_empty() => {
            return Err(AdminError::filter(
                "scoped filter must list at least one table",
            ))
        }
        PeerFilter::Scoped(t) => Some(format_table_cfs(t)),
    };
    let stored = StoredPeer {
        cluster_key: record.cluster_key.as_str().to_string(),
        state: record.state(),
        table_cfs,
    };
    serde_json::to_vec(&stored).map_err(|e| AdminError::corrupt(e.to_string()))
}

/// Rebuilds a record from a node read.
pub fn decode(id: PeerId, node: &Versioned) -> Result<PeerRecord, AdminError> {
    let stored: StoredPeer = serde_json::from_slice(&node.data)
        .map_err(|e| AdminError::corrupt(format!("peer {}: {}", id, e)))?;

    let cluster_key = ClusterKey::parse(&stored.cluster_key)
        .map_err(|e| AdminError::corrupt(format!("peer {}: {}", id, e)))?;

    let filter = match stored.table_cfs {
        None => PeerFilter::AllTables,
        Some(text) => {
            let table_cfs = parse_table_cfs(&text)
                .map_err(|e| AdminError::corrupt(format!("peer {}: {}", id, e)))?;
            if table_cfs.is_empty() {
                return Err(AdminError::corrupt(format!(
                    "peer {}: explicit empty table_cfs",
                    id
                )));
            }
            PeerFilter::Scoped(table_cfs)
        }
    };

    Ok(PeerRecord {
        id,
        cluster_key,
        enabled: stored.state.is_enabled(),
        filter,
        version: node.version,
    })
}
