//! # engo-store
//!
//! Path-addressed JSON storage with live child subscriptions.
//!
//! The chat core only ever talks to the [`MessageStore`] trait: reserve a
//! child key, write a value at a path, read a single value, and subscribe to
//! full snapshots of a path's children. Two backends are provided:
//! [`MemoryStore`] for a single process (and as the test double), and
//! [`SqliteStore`], which persists to a local SQLite file.

pub mod database;
pub mod hub;
pub mod memory;
pub mod migrations;
pub mod path;
pub mod push_key;

mod error;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use database::SqliteStore;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use path::StorePath;
pub use push_key::PushKeyGenerator;

/// Full state of a path's children at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: StorePath,
    /// Children in key order.
    pub children: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn empty(path: StorePath) -> Self {
        Self {
            path,
            children: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Item delivered on a subscription stream. An `Err` is terminal.
pub type SnapshotEvent = Result<Snapshot>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live subscription to the children of one path.
///
/// The first event is the current state; later events follow in the order
/// the store applied the writes. After an error the stream ends.
#[derive(Debug)]
pub struct StoreSubscription {
    pub id: SubscriptionId,
    pub path: StorePath,
    pub events: mpsc::UnboundedReceiver<SnapshotEvent>,
}

/// The persistence and subscription service the chat core runs against.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Allocate a fresh, time-ordered child key under `path`.
    async fn reserve_key(&self, path: &StorePath) -> Result<String>;

    /// Store `value` at `path`, replacing whatever was there.
    async fn write(&self, path: &StorePath, value: Value) -> Result<()>;

    /// Fetch the value at `path` once. A collection path yields an object of
    /// its children.
    async fn read(&self, path: &StorePath) -> Result<Option<Value>>;

    /// Start receiving snapshots of the children of `path`.
    async fn subscribe_children(&self, path: &StorePath) -> Result<StoreSubscription>;

    /// Stop a subscription. Unknown or already removed ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
