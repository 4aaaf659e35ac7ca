//! Catalog schema definitions.
//!
//! Two tables mirror the archive: `conversations` and `messages`, keyed on
//! `graph_id`. Timestamps are stored as ISO8601 TEXT exactly as received so
//! the catalog and the exported JSONL always agree byte for byte.

use rusqlite::{Connection, Result};

/// Current schema version for tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the catalog database.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
);

-- ====================
-- Archive Catalog
-- ====================

-- Conversations: one row per exported conversation directory
CREATE TABLE IF NOT EXISTS conversations (
    graph_id TEXT PRIMARY KEY,
    title TEXT,
    slug TEXT,
    url TEXT,
    created_at TEXT,
    updated_at TEXT,
    parent_graph_id TEXT,
    export_md_path TEXT,
    export_assets_path TEXT,
    content_hash TEXT,
    word_count INTEGER,
    page_order INTEGER,
    last_indexed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_conversations_updated_at ON conversations(updated_at);

-- Messages: ordered by ordinal within their conversation
CREATE TABLE IF NOT EXISTS messages (
    graph_id TEXT PRIMARY KEY,
    conversation_graph_id TEXT NOT NULL,
    title TEXT,
    slug TEXT,
    author TEXT,
    role TEXT,
    ordinal INTEGER,
    created_at TEXT,
    updated_at TEXT,
    parent_graph_id TEXT,
    export_md_path TEXT,
    export_assets_path TEXT,
    content_hash TEXT,
    word_count INTEGER,
    excerpt TEXT,
    last_indexed_at TEXT,
    FOREIGN KEY (conversation_graph_id) REFERENCES conversations(graph_id)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_graph_id);
CREATE INDEX IF NOT EXISTS idx_messages_updated_at ON messages(updated_at);
";

/// Apply pragmas and the schema. Safe to call on every startup.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // WAL lets a dashboard read while a sync writes
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            crate::model::now_iso()
        ],
    )?;

    Ok(())
}
