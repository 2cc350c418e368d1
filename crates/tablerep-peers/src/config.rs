//! Settings for the administration API and the `trp-admin` binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Settings for the administration API and the `trp-admin` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Replication root in the coordination store.
    pub store_root: String,
    /// Timeout applied to every store call.
    pub op_timeout_ms: u64,
    /// Retry policy for lost compare-and-set rounds.
    pub retry: RetryPolicy,
    /// Local store snapshot used by the binary.
    pub store_file: PathBuf,
    /// Local catalog snapshot used by the binary.
    pub catalog_file: PathBuf,
    /// Tables seeding the local catalog when `catalog_file` is absent.
    pub catalog_tables: BTreeMap<String, Vec<String>>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            store_root: String::from("/hbase/replication"),
            op_timeout_ms: 5000,
            retry: RetryPolicy::default(),
            store_file: PathBuf::from("/var/lib/tablerep/store.json"),
            catalog_file: PathBuf::from("/var/lib/tablerep/catalog.json"),
            catalog_tables: BTreeMap::new(),
        }
    }
}

impl AdminConfig {
    /// Loads a `.toml` or `.json` config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: AdminConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the API cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        tablerep_coord::path::validate(&self.store_root)
            .map_err(|e| anyhow::anyhow!("store_root: {}", e))?;
        if self.op_timeout_ms == 0 {
            anyhow::bail!("op_timeout_ms must be positive");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be positive");
        }
        Ok(())
    }

    /// Per-call store timeout.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}
