//! v001 -- Initial schema creation.
//!
//! A single `nodes` table holds every leaf value, keyed by its parent path and
//! child key, so a child snapshot is one indexed range scan.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    parent     TEXT NOT NULL,               -- e.g. messages/alice/bob
    key        TEXT NOT NULL,               -- push key or participant id
    value      TEXT NOT NULL,               -- JSON document
    written_at TEXT NOT NULL,               -- RFC-3339

    PRIMARY KEY (parent, key)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
