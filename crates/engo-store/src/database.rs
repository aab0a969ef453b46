//! SQLite-backed store.
//!
//! [`SqliteStore`] owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. Subscriptions are served
//! in-process: every write re-reads the parent collection and publishes it to
//! the watchers of that path.
//!
//! Statements run on tokio's blocking pool, so a caller's timeout around a
//! store call can fire while SQLite is still busy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::hub::SubscriptionHub;
use crate::migrations;
use crate::path::StorePath;
use crate::push_key::PushKeyGenerator;
use crate::{MessageStore, Snapshot, StoreSubscription, SubscriptionId};

pub struct SqliteStore {
    shared: Arc<Shared>,
    keys: PushKeyGenerator,
}

/// State the blocking workers need.
struct Shared {
    conn: Mutex<Connection>,
    hub: SubscriptionHub,
}

impl Shared {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl SqliteStore {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/engo/engo.db`
    /// - macOS:   `~/Library/Application Support/com.engo.engo/engo.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\engo\engo\data\engo.db`
    pub fn open_default() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "engo", "engo").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("engo.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// Open a throwaway database that lives only as long as the store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(conn),
                hub: SubscriptionHub::new(),
            }),
            keys: PushKeyGenerator::new(),
        })
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        let conn = self.shared.conn.lock().ok()?;
        conn.path().map(PathBuf::from)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Shared) -> Result<T> + Send + 'static,
    {
        let shared = self.shared.clone();
        tokio::task::spawn_blocking(move || f(&shared))
            .await
            .map_err(|e| StoreError::Unavailable(format!("database task failed: {e}")))?
    }
}

/// Load the children of `parent`. Rows whose JSON no longer parses are
/// skipped so one bad row cannot hide the rest.
fn load_children(conn: &Connection, parent: &StorePath) -> Result<Snapshot> {
    let mut stmt = conn.prepare_cached(
        "SELECT key, value FROM nodes
         WHERE parent = ?1
         ORDER BY key",
    )?;
    let rows = stmt.query_map(params![parent.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut children = BTreeMap::new();
    for row in rows {
        let (key, raw) = row?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                children.insert(key, value);
            }
            Err(e) => warn!(parent = %parent, key = %key, error = %e, "skipping unreadable row"),
        }
    }

    Ok(Snapshot {
        path: parent.clone(),
        children,
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
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
        let json = serde_json::to_string(&value)?;
        let path = path.clone();

        self.blocking(move |shared| {
            let conn = shared.conn()?;
            conn.execute(
                "INSERT OR REPLACE INTO nodes (parent, key, value, written_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![parent.to_string(), path.key(), json, Utc::now().to_rfc3339()],
            )?;
            debug!(path = %path, "value written");

            // Published under the connection lock, so watchers see writes in order.
            if shared.hub.is_watched(&parent) {
                let snapshot = load_children(&conn, &parent)?;
                shared.hub.publish(&snapshot);
            }
            Ok(())
        })
        .await
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>> {
        let path = path.clone();
        self.blocking(move |shared| {
            let conn = shared.conn()?;

            if let Some(parent) = path.parent() {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT value FROM nodes WHERE parent = ?1 AND key = ?2",
                        params![parent.to_string(), path.key()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(raw) = raw {
                    return Ok(Some(serde_json::from_str(&raw)?));
                }
            }

            let snapshot = load_children(&conn, &path)?;
            if snapshot.is_empty() {
                return Ok(None);
            }
            let map: Map<String, Value> = snapshot.children.into_iter().collect();
            Ok(Some(Value::Object(map)))
        })
        .await
    }

    async fn subscribe_children(&self, path: &StorePath) -> Result<StoreSubscription> {
        let path = path.clone();
        self.blocking(move |shared| {
            // Registered under the connection lock so no write slips in between.
            let conn = shared.conn()?;
            let initial = load_children(&conn, &path)?;
            Ok(shared.hub.register(initial))
        })
        .await
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.hub.remove(id);
    }
}
