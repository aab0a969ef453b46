//! Process-local store.
//!
//! Holds every collection in memory and fans snapshots out through the
//! [`SubscriptionHub`]. Fault injection hooks let callers simulate a store
//! that rejects writes, denies reads, or drops its connection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::hub::SubscriptionHub;
use crate::path::StorePath;
use crate::push_key::PushKeyGenerator;
use crate::{MessageStore, Snapshot, StoreSubscription, SubscriptionId};

#[derive(Debug, Default)]
struct Faults {
    failing_writes: Vec<StorePath>,
    denied_reads: Vec<StorePath>,
}

#[derive(Debug, Default)]
struct Inner {
    /// parent path -> (child key -> value)
    collections: HashMap<StorePath, BTreeMap<String, Value>>,
    faults: Faults,
}

impl Inner {
    fn snapshot(&self, path: &StorePath) -> Snapshot {
        Snapshot {
            path: path.clone(),
            children: self.collections.get(path).cloned().unwrap_or_default(),
        }
    }

    fn is_denied(&self, path: &StorePath) -> bool {
        self.faults.denied_reads.iter().any(|p| path.starts_with(p))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    hub: SubscriptionHub,
    keys: PushKeyGenerator,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write at or below `prefix` fail as if the backend were
    /// unreachable.
    pub fn fail_writes_under(&self, prefix: StorePath) {
        self.lock().faults.failing_writes.push(prefix);
    }

    /// Make reads and new subscriptions at or below `prefix` fail with
    /// [`StoreError::PermissionDenied`].
    pub fn deny_reads_under(&self, prefix: StorePath) {
        self.lock().faults.denied_reads.push(prefix);
    }

    /// Drop every live subscription at or below `prefix` with a
    /// connectivity error. Returns how many were ended.
    pub fn break_subscriptions(&self, prefix: &StorePath) -> usize {
        let _guard = self.lock();
        self.hub
            .fail_under(prefix, |_| StoreError::Unavailable("connection lost".into()))
    }

    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }

    /// Number of writes applied since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.hub.len()
    }

    /// Current children of `path`, without subscribing.
    pub fn children(&self, path: &StorePath) -> Snapshot {
        self.lock().snapshot(path)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn reserve_key(&self, path: &StorePath) -> Result<String> {
        let key = self.keys.next_key();
        debug!(path = %path, key = %key, "reserved key");
        Ok(key)
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<()> {
        let parent = path.parent().ok_or_else(|| StoreError::InvalidPath {
            path: path.to_string(),
            reason: "cannot overwrite a top-level collection",
        })?;

        let mut inner = self.lock();
        if inner.faults.failing_writes.iter().any(|p| path.starts_with(p)) {
            return Err(StoreError::Unavailable(format!("write to {path} rejected")));
        }

        inner
            .collections
            .entry(parent.clone())
            .or_default()
            .insert(path.key().to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path, "value written");

        if self.hub.is_watched(&parent) {
            self.hub.publish(&inner.snapshot(&parent));
        }
        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>> {
        let inner = self.lock();
        if inner.is_denied(path) {
            return Err(StoreError::PermissionDenied(path.clone()));
        }

        let leaf = path
            .parent()
            .and_then(|parent| inner.collections.get(&parent))
            .and_then(|children| children.get(path.key()))
            .cloned();
        if leaf.is_some() {
            return Ok(leaf);
        }

        Ok(inner
            .collections
            .get(path)
            .filter(|children| !children.is_empty())
            .map(|children| {
                let map: Map<String, Value> = children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Value::Object(map)
            }))
    }

    async fn subscribe_children(&self, path: &StorePath) -> Result<StoreSubscription> {
        let inner = self.lock();
        if inner.is_denied(path) {
            return Ok(self
                .hub
                .register_failed(path.clone(), StoreError::PermissionDenied(path.clone())));
        }
        Ok(self.hub.register(inner.snapshot(path)))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.remove(id);
    }
}
