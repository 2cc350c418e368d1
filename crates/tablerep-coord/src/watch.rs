//! Watch subscriptions for store change notification.
//!
//! Subscribers register a path prefix and receive every [`StoreEvent`] for
//! that prefix or any node beneath it. Removing the watches of a prefix
//! drops the senders, so receivers observe a disconnected channel.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::path;
use crate::store::StoreEvent;

/// A single subscription.
struct Subscription {
    id: u64,
    prefix: String,
    sender: Sender<StoreEvent>,
}

/// Tracks active watches and fans out events to them.
pub struct WatchRegistry {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl WatchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Adds a subscription and returns its receiving end.
    pub fn subscribe(&self, prefix: &str) -> Receiver<StoreEvent> {
        let (sender, receiver) = unbounded();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.lock().push(Subscription {
            id,
            prefix: prefix.to_string(),
            sender,
        });
        debug!(watch_id = id, prefix, "watch registered");
        receiver
    }

    /// Removes every subscription whose prefix lies at or under `prefix`.
    pub fn remove_under(&self, prefix: &str) -> usize {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| !path::is_under(&s.prefix, prefix));
        let removed = before - subs.len();
        if removed > 0 {
            debug!(prefix, removed, "watches removed");
        }
        removed
    }

    /// Delivers an event to every matching subscriber.
    ///
    /// Subscriptions whose receiver was dropped are pruned.
    pub fn notify(&self, event: &StoreEvent) {
        let mut subs = self.subscriptions.lock();
        subs.retain(|s| {
            if !path::is_under(&event.path, &s.prefix) {
                return true;
            }
            s.sender.send(event.clone()).is_ok()
        });
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// True if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EventKind;

    fn event(kind: EventKind, path: &str) -> StoreEvent {
        StoreEvent {
            kind,
            path: path.to_string(),
            version: 0,
        }
    }

    #[test]
    fn test_notify_matching_prefix() {
        let registry = WatchRegistry::new();
        let rx = registry.subscribe("/peers");
        registry.notify(&event(EventKind::Created, "/peers/1"));
        registry.notify(&event(EventKind::Created, "/other/1"));

        let got = rx.try_recv().unwrap();
        assert_eq!(got.path, "/peers/1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_under_disconnects() {
        let registry = WatchRegistry::new();
        let rx1 = registry.subscribe("/peers/1");
        let rx2 = registry.subscribe("/peers/1/queues");
        let _rx3 = registry.subscribe("/peers/2");

        assert_eq!(registry.remove_under("/peers/1"), 2);
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            rx1.recv(),
            Err(crossbeam_channel::RecvError)
        ));
        assert!(rx2.recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let registry = WatchRegistry::new();
        let rx = registry.subscribe("/peers");
        drop(rx);
        registry.notify(&event(EventKind::Deleted, "/peers/1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sibling_prefix_not_matched() {
        let registry = WatchRegistry::new();
        let rx = registry.subscribe("/peers/1");
        registry.notify(&event(EventKind::Updated, "/peers/10"));
        assert!(rx.try_recv().is_err());
    }
}
