//! SQLite schema for the link registry
//!
//! Timestamps are stored as UTC microseconds since the Unix epoch so that
//! integer ordering matches chronological ordering.

use crate::error::Result;
use rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS links (
    id          TEXT PRIMARY KEY NOT NULL,
    target_url  TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_created_at ON links (created_at);

CREATE TABLE IF NOT EXISTS scans (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    link_id     TEXT NOT NULL REFERENCES links (id) ON DELETE CASCADE,
    scanned_at  INTEGER NOT NULL,
    user_agent  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scans_link_time ON scans (link_id, scanned_at);

CREATE TABLE IF NOT EXISTS settings (
    key    TEXT PRIMARY KEY NOT NULL,
    value  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS retired_links (
    id  TEXT PRIMARY KEY NOT NULL
);
"#;

/// Enable foreign keys and create any missing tables.
pub(crate) fn apply(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
