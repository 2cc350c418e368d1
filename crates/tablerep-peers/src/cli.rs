//! `trp-admin` command line: subcommands, snapshot handling and output rendering.

use crate::admin::ReplicationAdmin;
use crate::catalog::MemoryCatalog;
use crate::config::AdminConfig;
use crate::table_cfs::{format_table_cfs, parse_table_cfs};
use crate::types::{FamilyScope, PeerFilter, PeerState, PeerSummary, TableReplicationInfo};
use anyhow::Result;
use clap::{Parser, Subcommand};
use fs2::FileExt;
use regex::Regex;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablerep_coord::MemoryStore;

/// Command line of `trp-admin`.
#[derive(Parser)]
#[command(name = "trp-admin")]
#[command(about = "Replication peer administration", long_about = None)]
pub struct Cli {
    /// Config file (.toml or .json).
    #[arg(short, long, env = "TRP_ADMIN_CONFIG", default_value = "/etc/tablerep/admin.toml")]
    pub config: PathBuf,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// `trp-admin` subcommands.
#[derive(Subcommand, Debug, Clone)]
#[allow(missing_docs)]
pub enum Command {
    /// Add a peer cluster to replicate to.
    AddPeer {
        id: String,
        cluster_key: String,
        /// Table scoping, e.g. "t1:cf1,cf2;t2". Omit to replicate all tables.
        #[arg(long)]
        table_cfs: Option<String>,
    },
    /// Remove a peer cluster and stop replicating to it.
    RemovePeer { id: String },
    /// List all peer clusters.
    ListPeers,
    /// Show whether a peer is enabled.
    GetPeerState { id: String },
    /// Resume replication to a peer.
    EnablePeer { id: String },
    /// Stop replication to a peer.
    DisablePeer { id: String },
    /// Show a peer's table scoping.
    ShowPeerTableCfs { id: String },
    /// Replace a peer's table scoping; "" replicates all tables.
    SetPeerTableCfs { id: String, table_cfs: String },
    /// List replicated tables matching a regex.
    ListReplicatedTables {
        #[arg(default_value = ".*")]
        regex: String,
    },
    /// Mark every family of a table as replicated.
    EnableTableRep { table: String },
    /// Mark every family of a table as local.
    DisableTableRep { table: String },
}

impl Command {
    fn mutates_store(&self) -> bool {
        matches!(
            self,
            Command::AddPeer { .. }
                | Command::RemovePeer { .. }
                | Command::EnablePeer { .. }
                | Command::DisablePeer { .. }
                | Command::SetPeerTableCfs { .. }
        )
    }

    fn mutates_catalog(&self) -> bool {
        matches!(
            self,
            Command::EnableTableRep { .. } | Command::DisableTableRep { .. }
        )
    }

    /// Runs the command and returns what to print.
    pub fn execute(&self, admin: &ReplicationAdmin) -> Result<String> {
        let out = match self {
            Command::AddPeer {
                id,
                cluster_key,
                table_cfs,
            } => {
                let filter = match table_cfs {
                    Some(text) => PeerFilter::from_table_cfs(parse_table_cfs(text)?),
                    None => PeerFilter::AllTables,
                };
                admin.add_peer(id, cluster_key, filter)?;
                format!("Added peer {}", id)
            }
            Command::RemovePeer { id } => {
                admin.remove_peer(id)?;
                format!("Removed peer {}", id)
            }
            Command::ListPeers => render_peers(&admin.list_peers()?),
            Command::GetPeerState { id } => admin.get_peer_state(id)?.to_string(),
            Command::EnablePeer { id } => {
                admin.enable_peer(id)?;
                format!("Peer {} is {}", id, PeerState::Enabled)
            }
            Command::DisablePeer { id } => {
                admin.disable_peer(id)?;
                format!("Peer {} is {}", id, PeerState::Disabled)
            }
            Command::ShowPeerTableCfs { id } => admin.show_peer_table_cfs(id)?,
            Command::SetPeerTableCfs { id, table_cfs } => {
                admin.set_peer_table_cfs(id, table_cfs)?;
                format!("Set table-cfs of peer {} to '{}'", id, admin.show_peer_table_cfs(id)?)
            }
            Command::ListReplicatedTables { regex } => {
                let pattern = Regex::new(regex)?;
                render_replicated_tables(&admin.list_replicated_tables(&pattern)?)
            }
            Command::EnableTableRep { table } => {
                if admin.enable_table_replication(table)? {
                    format!("Replication enabled for table {}", table)
                } else {
                    format!("Replication already enabled for table {}", table)
                }
            }
            Command::DisableTableRep { table } => {
                if admin.disable_table_replication(table)? {
                    format!("Replication disabled for table {}", table)
                } else {
                    format!("Replication already disabled for table {}", table)
                }
            }
        };
        Ok(out)
    }
}

impl Cli {
    /// Loads config and local state, runs the command, saves what changed.
    ///
    /// The store and catalog snapshots stay locked from load through save,
    /// so concurrent invocations apply one after the other.
    pub fn run(self) -> Result<()> {
        let config = if self.config.exists() {
            AdminConfig::from_file(&self.config)?
        } else {
            tracing::warn!("Config file not found, using defaults: {}", self.config.display());
            AdminConfig::default()
        };

        ensure_parent(&config.store_file)?;
        ensure_parent(&config.catalog_file)?;
        let snapshots = [config.store_file.as_path(), config.catalog_file.as_path()];
        let out = with_snapshot_lock(&snapshots, || self.command.apply(&config))?;
        println!("{}", out);
        Ok(())
    }
}

impl Command {
    /// Loads the snapshots, executes, and saves the ones that changed.
    /// Callers must hold the snapshot lock.
    fn apply(&self, config: &AdminConfig) -> Result<String> {
        let store = Arc::new(MemoryStore::load(&config.store_file)?);
        let catalog = Arc::new(MemoryCatalog::load_or_seed(
            &config.catalog_file,
            &config.catalog_tables,
        )?);
        let admin = ReplicationAdmin::from_config(config, store.clone(), catalog.clone());

        let out = self.execute(&admin)?;
        if self.mutates_store() {
            store.save(&config.store_file)?;
        }
        if self.mutates_catalog() {
            catalog.save(&config.catalog_file)?;
        }
        Ok(out)
    }
}

fn ensure_parent(file: &Path) -> Result<()> {
    if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn lock_file_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some(extension) => path.with_extension(format!("{}.lock", extension)),
        None => path.with_extension("lock"),
    }
}

/// Runs `f` holding exclusive locks on the sidecar `.lock` files of
/// `snapshots`. Locks are taken in path order.
pub fn with_snapshot_lock<T>(snapshots: &[&Path], f: impl FnOnce() -> Result<T>) -> Result<T> {
    let mut lock_paths: Vec<PathBuf> = snapshots.iter().map(|p| lock_file_path(p)).collect();
    lock_paths.sort();
    lock_paths.dedup();

    let mut locks = Vec::with_capacity(lock_paths.len());
    for path in &lock_paths {
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        lock_file.lock_exclusive()?;
        locks.push(lock_file);
    }

    let result = f();
    let unlock_result = locks
        .iter()
        .rev()
        .try_for_each(|lock_file| fs2::FileExt::unlock(lock_file));
    match (result, unlock_result) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) => Err(error.into()),
        (Err(error), _) => Err(error),
    }
}

/// Peer table as printed by `list-peers`.
pub fn render_peers(peers: &[PeerSummary]) -> String {
    let mut out = format!(
        "{:<12} {:<32} {:<9} {}\n",
        "PEER_ID", "CLUSTER_KEY", "STATE", "TABLE_CFS"
    );
    for peer in peers {
        out.push_str(&format!(
            "{:<12} {:<32} {:<9} {}\n",
            peer.id,
            peer.cluster_key,
            PeerState::from_enabled(peer.enabled),
            format_table_cfs(&peer.filter.table_cfs())
        ));
    }
    out.push_str(&format!("{} row(s)", peers.len()));
    out
}

/// Table listing as printed by `list-replicated-tables`.
pub fn render_replicated_tables(rows: &[TableReplicationInfo]) -> String {
    let mut out = format!("{:<24} {:<32} {}\n", "TABLE", "COLUMN_FAMILIES", "PEERS");
    for row in rows {
        let families: Vec<&str> = row.column_families.iter().map(String::as_str).collect();
        let peers: Vec<String> = row
            .peers
            .iter()
            .map(|p| {
                let scope = match &p.scope {
                    FamilyScope::AllFamilies => "*".to_string(),
                    FamilyScope::Families(f) => f.iter().cloned().collect::<Vec<_>>().join(","),
                };
                format!("{}[{}]({})", p.peer_id, scope, PeerState::from_enabled(p.enabled))
            })
            .collect();
        out.push_str(&format!(
            "{:<24} {:<32} {}\n",
            row.table,
            families.join(","),
            peers.join(" ")
        ));
    }
    out.push_str(&format!("{} row(s)", rows.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use tablerep_coord::StoreClient;

    fn admin() -> ReplicationAdmin {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.create_table("t1", ["cf1", "cf2"]);
        ReplicationAdmin::new(
            StoreClient::with_timeout(store, Duration::from_millis(100)),
            "/hbase/replication",
            RetryPolicy::no_backoff(3),
            catalog,
        )
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["trp-admin"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_parse_add_peer() {
        let cmd = parse(&["add-peer", "1", "zk:2181:/hbase", "--table-cfs", "t1:cf1"]);
        match cmd {
            Command::AddPeer {
                id,
                cluster_key,
                table_cfs,
            } => {
                assert_eq!(id, "1");
                assert_eq!(cluster_key, "zk:2181:/hbase");
                assert_eq!(table_cfs.as_deref(), Some("t1:cf1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_replicated_default_regex() {
        match parse(&["list-replicated-tables"]) {
            Command::ListReplicatedTables { regex } => assert_eq!(regex, ".*"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_execute_peer_lifecycle() {
        let admin = admin();
        parse(&["add-peer", "1", "zk:2181:/hbase", "--table-cfs", "t1:cf1"])
            .execute(&admin)
            .unwrap();
        assert_eq!(
            parse(&["get-peer-state", "1"]).execute(&admin).unwrap(),
            "ENABLED"
        );
        parse(&["disable-peer", "1"]).execute(&admin).unwrap();
        assert_eq!(
            parse(&["get-peer-state", "1"]).execute(&admin).unwrap(),
            "DISABLED"
        );
        assert_eq!(
            parse(&["show-peer-table-cfs", "1"]).execute(&admin).unwrap(),
            "t1:cf1"
        );
        parse(&["set-peer-table-cfs", "1", ""]).execute(&admin).unwrap();
        assert_eq!(
            parse(&["show-peer-table-cfs", "1"]).execute(&admin).unwrap(),
            ""
        );

        let listing = parse(&["list-peers"]).execute(&admin).unwrap();
        assert!(listing.contains("zk:2181:/hbase"));
        assert!(listing.ends_with("1 row(s)"));

        parse(&["remove-peer", "1"]).execute(&admin).unwrap();
        assert!(parse(&["remove-peer", "1"]).execute(&admin).is_err());
    }

    #[test]
    fn test_execute_list_replicated_tables() {
        let admin = admin();
        parse(&["add-peer", "1", "zk:2181:/hbase"])
            .execute(&admin)
            .unwrap();
        let out = parse(&["list-replicated-tables"]).execute(&admin).unwrap();
        assert!(out.ends_with("0 row(s)"));

        parse(&["enable-table-rep", "t1"]).execute(&admin).unwrap();
        let out = parse(&["list-replicated-tables", "t.*"])
            .execute(&admin)
            .unwrap();
        assert!(out.contains("cf1,cf2"));
        assert!(out.contains("1[*](ENABLED)"));
        assert!(parse(&["list-replicated-tables", "("])
            .execute(&admin)
            .is_err());
    }

    #[test]
    fn test_execute_table_rep_switch() {
        let admin = admin();
        let out = parse(&["enable-table-rep", "t1"]).execute(&admin).unwrap();
        assert_eq!(out, "Replication enabled for table t1");
        let out = parse(&["enable-table-rep", "t1"]).execute(&admin).unwrap();
        assert_eq!(out, "Replication already enabled for table t1");
        assert!(parse(&["disable-table-rep", "nope"])
            .execute(&admin)
            .is_err());
    }

    #[test]
    fn test_mutation_flags() {
        assert!(parse(&["enable-peer", "1"]).mutates_store());
        assert!(!parse(&["list-peers"]).mutates_store());
        assert!(parse(&["enable-table-rep", "t"]).mutates_catalog());
        assert!(!parse(&["enable-table-rep", "t"]).mutates_store());
    }

    #[test]
    fn test_run_persists_between_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("admin.json");
        let config = AdminConfig {
            store_file: dir.path().join("state/store.json"),
            catalog_file: dir.path().join("state/catalog.json"),
            ..AdminConfig::default()
        };
        std::fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();

        let run = |args: &[&str]| {
            let mut argv = vec!["trp-admin", "--config", config_path.to_str().unwrap()];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap().run()
        };
        run(&["add-peer", "2", "zk:2181:/hbase"]).unwrap();
        run(&["disable-peer", "2"]).unwrap();

        let store = Arc::new(MemoryStore::load(&config.store_file).unwrap());
        let admin = ReplicationAdmin::from_config(&config, store, Arc::new(MemoryCatalog::new()));
        assert_eq!(admin.get_peer_state("2").unwrap(), PeerState::Disabled);
    }

    fn temp_config(dir: &Path) -> (PathBuf, AdminConfig) {
        let config_path = dir.join("admin.json");
        let config = AdminConfig {
            store_file: dir.join("store.json"),
            catalog_file: dir.join("catalog.json"),
            ..AdminConfig::default()
        };
        std::fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();
        (config_path, config)
    }

    fn run_with(config_path: &Path, args: &[&str]) -> Result<()> {
        let mut argv = vec!["trp-admin", "--config", config_path.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().run()
    }

    fn stored_peer_ids(config: &AdminConfig) -> Vec<String> {
        let store = Arc::new(MemoryStore::load(&config.store_file).unwrap());
        let admin = ReplicationAdmin::from_config(config, store, Arc::new(MemoryCatalog::new()));
        admin
            .list_peers()
            .unwrap()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect()
    }

    #[test]
    fn test_lock_file_path() {
        assert_eq!(
            lock_file_path(Path::new("/var/lib/store.json")),
            PathBuf::from("/var/lib/store.json.lock")
        );
        assert_eq!(
            lock_file_path(Path::new("/var/lib/store")),
            PathBuf::from("/var/lib/store.lock")
        );
    }

    #[test]
    fn test_overlapping_invocations_keep_both_writes() {
        let dir = tempfile::tempdir().unwrap();
        let (config_path, config) = temp_config(dir.path());
        let snapshots = [config.store_file.as_path(), config.catalog_file.as_path()];

        // First invocation loads, then a second one starts before it saves.
        with_snapshot_lock(&snapshots, || {
            let store = Arc::new(MemoryStore::load(&config.store_file)?);
            let catalog = Arc::new(MemoryCatalog::new());
            let admin = ReplicationAdmin::from_config(&config, store.clone(), catalog);

            let second = {
                let config_path = config_path.clone();
                std::thread::spawn(move || {
                    run_with(&config_path, &["add-peer", "2", "zk2:2181:/hbase"])
                })
            };
            std::thread::sleep(Duration::from_millis(100));

            admin.add_peer("1", "zk1:2181:/hbase", PeerFilter::AllTables)?;
            store.save(&config.store_file)?;
            Ok(second)
        })
        .unwrap()
        .join()
        .unwrap()
        .unwrap();

        assert_eq!(stored_peer_ids(&config), vec!["1", "2"]);
    }

    #[test]
    fn test_concurrent_invocations_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let (config_path, config) = temp_config(dir.path());

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let config_path = config_path.clone();
                std::thread::spawn(move || {
                    let id = i.to_string();
                    let key = format!("zk{}:2181:/hbase", i);
                    run_with(&config_path, &["add-peer", id.as_str(), key.as_str()])
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(stored_peer_ids(&config), vec!["0", "1", "2", "3", "4", "5"]);
    }
}
