use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS records (
    record_key TEXT PRIMARY KEY CHECK (length(trim(record_key)) > 0),
    inserted_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS fields (
    record_key TEXT NOT NULL REFERENCES records (record_key) ON DELETE CASCADE,
    field_key TEXT NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (record_key, field_key)
);

-- Exactly one row; the flag is the whole lease.
CREATE TABLE IF NOT EXISTS edit_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    active_edits INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
INSERT OR IGNORE INTO edit_state (id, active_edits) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS column_preferences (
    user_id TEXT NOT NULL,
    view_name TEXT NOT NULL,
    layout BLOB NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    PRIMARY KEY (user_id, view_name)
);
";
