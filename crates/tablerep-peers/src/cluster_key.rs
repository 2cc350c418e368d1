//! Destination cluster keys.
//!
//! A cluster key names the coordination quorum of the destination cluster:
//! `quorum:client_port:znode_parent`, for example `zk1,zk2,zk3:2181:/hbase`.
//! Keys are kept verbatim; parsing only checks the shape.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AdminError;

/// Validated, verbatim cluster key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterKey(String);

/// The three parts of a cluster key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterKeyParts {
    /// Quorum host names.
    pub quorum: Vec<String>,
    /// Coordination client port.
    pub client_port: u16,
    /// Root path of the destination cluster.
    pub znode_parent: String,
}

impl ClusterKey {
    /// Validates `key` and keeps it verbatim.
    pub fn parse(key: &str) -> Result<Self, AdminError> {
        split(key)?;
        Ok(Self(key.to_string()))
    }

    /// The key exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key's components.
    pub fn parts(&self) -> ClusterKeyParts {
        // Already validated at construction.
        split(&self.0).unwrap_or_else(|_| ClusterKeyParts {
            quorum: Vec::new(),
            client_port: 0,
            znode_parent: String::new(),
        })
    }
}

fn split(key: &str) -> Result<ClusterKeyParts, AdminError> {
    let invalid = |reason: &str| AdminError::InvalidClusterKey {
        cluster_key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.trim().is_empty() {
        return Err(invalid("empty"));
    }
    let fields: Vec<&str> = key.splitn(3, ':').collect();
    if fields.len() != 3 {
        return Err(invalid("expected quorum:client_port:znode_parent"));
    }

    let quorum: Vec<String> = fields[0].split(',').map(str::to_string).collect();
    if quorum.iter().any(|h| h.is_empty() || h.chars().any(char::is_whitespace)) {
        return Err(invalid("quorum must be a comma separated list of hosts"));
    }

    let client_port: u16 = fields[1]
        .parse()
        .map_err(|_| invalid("client port is not a number"))?;
    if client_port == 0 {
        return Err(invalid("client port must be non-zero"));
    }

    let znode_parent = fields[2];
    if !znode_parent.starts_with('/') {
        return Err(invalid("znode parent must be an absolute path"));
    }
    if znode_parent.contains(':') {
        return Err(invalid("znode parent must not contain ':'"));
    }

    Ok(ClusterKeyParts {
        quorum,
        client_port,
        znode_parent: znode_parent.to_string(),
    })
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for ClusterKey {
    type Error = AdminError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ClusterKey> for String {
    fn from(k: ClusterKey) -> Self {
        k.0
    }
}
