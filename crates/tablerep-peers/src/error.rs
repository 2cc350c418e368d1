//! Error types for replication peer administration.

use tablerep_coord::StoreError;
use thiserror::Error;

/// Errors surfaced by the administration API.
///
/// Every variant is a distinct outcome callers can match on; automation
/// should retry only when [`AdminError::is_retryable`] says so.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// A peer with this id already exists.
    #[error("peer {peer_id} already exists")]
    DuplicatePeer {
        /// The id that is already taken.
        peer_id: String,
    },

    /// No peer with this id exists.
    #[error("peer {peer_id} does not exist")]
    NoSuchPeer {
        /// The id that was looked up.
        peer_id: String,
    },

    /// The peer id is not usable as a registry key.
    #[error("invalid peer id '{peer_id}': {reason}")]
    InvalidPeerId {
        /// The rejected id.
        peer_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The cluster key does not have the `quorum:port:parent` shape.
    #[error("invalid cluster key '{cluster_key}': {reason}")]
    InvalidClusterKey {
        /// The rejected key.
        cluster_key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The table-CF filter contains an unusable table or family name.
    #[error("invalid table-cfs spec: {reason}")]
    InvalidFilterSpec {
        /// Why the filter was rejected.
        reason: String,
    },

    /// Optimistic concurrency retries were exhausted.
    #[error("peer {peer_id} was concurrently modified, gave up after {attempts} attempts")]
    ConcurrentModification {
        /// The contended peer.
        peer_id: String,
        /// How many read-modify-write rounds were tried.
        attempts: u32,
    },

    /// The coordination store did not answer in time.
    #[error("coordination store unavailable: {msg}")]
    StoreUnavailable {
        /// Details from the store client.
        msg: String,
    },

    /// Stored data or the store itself broke its contract.
    #[error("corrupt replication state: {msg}")]
    Corrupt {
        /// What was wrong.
        msg: String,
    },

    /// The table is not in the catalog.
    #[error("table {table} does not exist")]
    NoSuchTable {
        /// The missing table.
        table: String,
    },
}

impl AdminError {
    /// True for outcomes that may succeed if the caller tries again.
    ///
    /// After `StoreUnavailable` the caller must re-query state before
    /// retrying a mutation; the write may or may not have landed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdminError::ConcurrentModification { .. } | AdminError::StoreUnavailable { .. }
        )
    }

    pub(crate) fn filter(reason: impl Into<String>) -> Self {
        AdminError::InvalidFilterSpec {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        AdminError::Corrupt { msg: msg.into() }
    }
}

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable { msg } => AdminError::StoreUnavailable { msg },
            other => AdminError::Corrupt {
                msg: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdminError::DuplicatePeer {
            peer_id: "1".to_string(),
        };
        assert_eq!(err.to_string(), "peer 1 already exists");

        let err = AdminError::ConcurrentModification {
            peer_id: "2".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "peer 2 was concurrently modified, gave up after 3 attempts"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(AdminError::ConcurrentModification {
            peer_id: "1".to_string(),
            attempts: 3
        }
        .is_retryable());
        assert!(AdminError::StoreUnavailable {
            msg: "timeout".to_string()
        }
        .is_retryable());
        assert!(!AdminError::InvalidClusterKey {
            cluster_key: "x".to_string(),
            reason: "bad".to_string()
        }
        .is_retryable());
        assert!(!AdminError::NoSuchPeer {
            peer_id: "1".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_from_store_error() {
        let err: AdminError = StoreError::Unavailable {
            msg: "partition".to_string(),
        }
        .into();
        assert_eq!(
            err,
            AdminError::StoreUnavailable {
                msg: "partition".to_string()
            }
        );

        let err: AdminError = StoreError::NotEmpty {
            path: "/p".to_string(),
        }
        .into();
        assert!(matches!(err, AdminError::Corrupt { .. }));
    }
}
