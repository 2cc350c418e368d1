#![warn(missing_docs)]

//! tablerep peer administration: replication peer registry, enable/disable
//! control, table/column-family scoping and replicated-table listing

pub mod admin;
pub mod catalog;
pub mod cli;
pub mod cluster_key;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod listing;
pub mod registry;
pub mod retry;
pub mod table_cfs;
pub mod types;

pub use admin::ReplicationAdmin;
pub use catalog::{MemoryCatalog, ReplicationScope, TableCatalog, TableCatalogAdmin};
pub use cluster_key::ClusterKey;
pub use config::AdminConfig;
pub use error::AdminError;
pub use retry::RetryPolicy;
pub use types::{
    FamilyScope, PeerFilter, PeerId, PeerRecord, PeerReplication, PeerState, PeerSummary,
    TableCfs, TableReplicationInfo,
};
