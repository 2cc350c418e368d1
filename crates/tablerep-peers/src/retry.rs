//! Bounded retry for optimistic read-modify-write cycles.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AdminError;
use crate::types::PeerId;

/// How often and how patiently to retry a lost compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total read-modify-write rounds, including the first.
    pub max_attempts: u32,
    /// Sleep after the first lost round.
    pub initial_backoff_ms: u64,
    /// Upper bound on the sleep between rounds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Retries `max_attempts` rounds back to back.
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Sleep after losing round `attempt` (1-based): doubles each round,
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Runs `round` until it returns `Some`, at most `max_attempts` times.
    ///
    /// `round` returns `Ok(None)` when its compare-and-set lost to another
    /// writer. Errors end the loop immediately.
    pub fn run<T, F>(&self, peer_id: &PeerId, mut round: F) -> Result<T, AdminError>
    where
        F: FnMut() -> Result<Option<T>, AdminError>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(value) = round()? {
                return Ok(value);
            }
            if attempt < attempts {
                let backoff = self.backoff(attempt);
                debug!(peer_id = %peer_id, attempt, ?backoff, "lost compare-and-set, retrying");
                if !backoff.is_zero() {
                    std::thread::sleep(backoff);
                }
            }
        }
        warn!(peer_id = %peer_id, attempts, "compare-and-set retries exhausted");
        Err(AdminError::ConcurrentModification {
            peer_id: peer_id.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        PeerId::new("1").unwrap()
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(10), Duration::from_millis(200));
    }

    #[test]
    fn test_succeeds_after_lost_rounds() {
        let mut calls = 0;
        let result = RetryPolicy::no_backoff(3).run(&peer(), || {
            calls += 1;
            Ok(if calls == 3 { Some(calls) } else { None })
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_exhaustion() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::no_backoff(4).run(&peer(), || {
            calls += 1;
            Ok(None)
        });
        assert_eq!(calls, 4);
        assert_eq!(
            result.unwrap_err(),
            AdminError::ConcurrentModification {
                peer_id: "1".to_string(),
                attempts: 4
            }
        );
    }

    #[test]
    fn test_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::no_backoff(5).run(&peer(), || {
            calls += 1;
            Err(AdminError::NoSuchPeer {
                peer_id: "1".to_string(),
            })
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(AdminError::NoSuchPeer { .. })));
    }

    #[test]
    fn test_zero_attempts_runs_once() {
        let mut calls = 0;
        let _ = RetryPolicy::no_backoff(0).run(&peer(), || {
            calls += 1;
            Ok(None::<()>)
        });
        assert_eq!(calls, 1);
    }
}
