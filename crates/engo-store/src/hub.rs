//! Subscriber bookkeeping shared by the store backends.
//!
//! Backends call [`SubscriptionHub::publish`] while still holding their own
//! data lock, so snapshots reach every subscriber in write order.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::StoreError;
use crate::path::StorePath;
use crate::{Snapshot, SnapshotEvent, StoreSubscription, SubscriptionId};

#[derive(Debug)]
struct Subscriber {
    path: StorePath,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

#[derive(Debug, Default)]
pub struct SubscriptionHub {
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and hand it `initial` as its first event.
    pub fn register(&self, initial: Snapshot) -> StoreSubscription {
        let (tx, events) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        let path = initial.path.clone();

        // The receiver is still in hand, so the send cannot fail.
        let _ = tx.send(Ok(initial));

        self.lock().insert(
            id,
            Subscriber {
                path: path.clone(),
                tx,
            },
        );
        debug!(sub = %id, path = %path, "subscriber registered");

        StoreSubscription { id, path, events }
    }

    /// Hand out a subscription whose only event is `error`.
    pub fn register_failed(&self, path: StorePath, error: StoreError) -> StoreSubscription {
        let (tx, events) = mpsc::unbounded_channel();
        let _ = tx.send(Err(error));
        StoreSubscription {
            id: SubscriptionId::new(),
            path,
            events,
        }
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(sub = %id, "subscriber removed");
        }
        removed
    }

    /// Whether anyone currently watches the children of `path`.
    pub fn is_watched(&self, path: &StorePath) -> bool {
        self.lock().values().any(|s| &s.path == path)
    }

    /// Deliver `snapshot` to everyone watching its path. Subscribers whose
    /// receiver has gone away are dropped.
    pub fn publish(&self, snapshot: &Snapshot) {
        let mut subscribers = self.lock();
        subscribers.retain(|_, sub| {
            if sub.path != snapshot.path {
                return true;
            }
            sub.tx.send(Ok(snapshot.clone())).is_ok()
        });
    }

    /// End every subscription at or below `prefix` with an error built by
    /// `make_error`.
    pub fn fail_under<F>(&self, prefix: &StorePath, make_error: F) -> usize
    where
        F: Fn(&StorePath) -> StoreError,
    {
        let mut subscribers = self.lock();
        let failed: Vec<SubscriptionId> = subscribers
            .iter()
            .filter(|(_, sub)| sub.path.starts_with(prefix))
            .map(|(id, _)| *id)
            .collect();

        for id in &failed {
            if let Some(sub) = subscribers.remove(id) {
                let _ = sub.tx.send(Err(make_error(&sub.path)));
            }
        }
        failed.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        // The map holds no invariants a panic could break halfway.
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
