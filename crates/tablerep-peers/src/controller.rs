//! Enable/disable control of replication peers.
//!
//! Shippers watch the `enabled` flag to decide whether to stream, so a lost
//! update here silently resumes or halts replication. Every flip is a
//! versioned read-modify-write retried under the configured
//! [`RetryPolicy`].

use tracing::{debug, info};

use crate::error::AdminError;
use crate::registry::PeerRegistry;
use crate::retry::RetryPolicy;
use crate::types::{PeerId, PeerState};

/// Toggles the replication state of peers.
#[derive(Clone)]
pub struct ReplicationController {
    registry: PeerRegistry,
    retry: RetryPolicy,
}

impl ReplicationController {
    /// Controller over `registry` using `retry` for lost races.
    pub fn new(registry: PeerRegistry, retry: RetryPolicy) -> Self {
        Self { registry, retry }
    }

    /// Resumes shipping to a peer. No-op if already enabled.
    pub fn enable_peer(&self, id: &str) -> Result<(), AdminError> {
        self.set_state(id, PeerState::Enabled).map(|_| ())
    }

    /// Stops shipping to a peer. No-op if already disabled.
    pub fn disable_peer(&self, id: &str) -> Result<(), AdminError> {
        self.set_state(id, PeerState::Disabled).map(|_| ())
    }

    /// Current state of a peer.
    pub fn get_peer_state(&self, id: &str) -> Result<PeerState, AdminError> {
        self.registry.get_peer_state(id)
    }

    /// Moves a peer to `state`. Returns whether the record was rewritten;
    /// a peer already in `state` is left at its current version.
    pub fn set_state(&self, id: &str, state: PeerState) -> Result<bool, AdminError> {
        let id = PeerId::new(id)?;
        let enabled = state.is_enabled();

        let changed = self.retry.run(&id, || {
            let mut record = self.registry.load(&id)?;
            if record.enabled == enabled {
                debug!(peer_id = %id, %state, "peer already in requested state");
                return Ok(Some(false));
            }
            record.enabled = enabled;
            Ok(self.registry.store_if_unchanged(&record)?.map(|_| true))
        })?;

        if changed {
            info!(peer_id = %id, %state, "replication peer state changed");
        }
        Ok(changed)
    }
}
