//! Error types for the coordination store client.

use thiserror::Error;

/// Errors returned by a [`CoordinationStore`](crate::store::CoordinationStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No node exists at the path.
    #[error("node not found: {path}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// A node already exists at the path.
    #[error("node already exists: {path}")]
    AlreadyExists {
        /// The path that was already taken.
        path: String,
    },

    /// The node still has children and cannot be deleted.
    #[error("node has children: {path}")]
    NotEmpty {
        /// The path that still has children.
        path: String,
    },

    /// Compare-and-set lost: the node moved past the expected version.
    #[error("version mismatch at {path}: expected {expected}, actual {actual}")]
    VersionMismatch {
        /// The path that was written.
        path: String,
        /// The version the writer last observed.
        expected: i64,
        /// The version currently stored.
        actual: i64,
    },

    /// The store could not be reached within the operation timeout.
    #[error("coordination store unavailable: {msg}")]
    Unavailable {
        /// What went wrong talking to the store.
        msg: String,
    },

    /// The path is not a well-formed absolute store path.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Loading or saving a store snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    /// True when the error means the store never answered.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Snapshot(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Snapshot(e.to_string())
    }
}
