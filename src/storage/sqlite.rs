//! SQLite catalog implementation.
//!
//! The catalog is a queryable mirror of the filesystem archive. Writes are
//! keyed on `graph_id` and never delete; `created_at` is first-write-wins.

use crate::error::{Error, Result};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SQLite-backed archive catalog.
///
/// The sync controller owns exactly one of these for the lifetime of a run,
/// so catalog writes are always serialized.
#[derive(Debug)]
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Open (or create) a catalog database at the given path.
    ///
    /// Parent directories are created as needed and the schema is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a catalog with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // Default 5 second timeout
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Create the catalog file and schema if missing, then close it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn ensure_schema(path: &Path) -> Result<()> {
        Self::open(path).map(drop)
    }

    /// Execute a write inside an IMMEDIATE transaction.
    ///
    /// The closure's writes are committed together or rolled back on error.
    ///
    /// # Errors
    ///
    /// Returns whatever the closure returns, or the commit failure.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> rusqlite::Result<R>
    where
        F: FnOnce(&Transaction) -> rusqlite::Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let result = f(&tx)?;
        tx.commit()?;

        debug!(op, "catalog transaction committed");
        Ok(result)
    }

    // ======================
    // Conversation Operations
    // ======================

    /// Insert or update a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_conversation(&self, rec: &Conversation) -> Result<()> {
        upsert_conversation(&self.conn, rec)?;
        Ok(())
    }

    /// Look up a conversation by `graph_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_conversation(&self, graph_id: &str) -> Result<Option<Conversation>> {
        let conv = self
            .conn
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE graph_id = ?1"),
                [graph_id],
                map_conversation_row,
            )
            .optional()?;
        Ok(conv)
    }

    /// List conversations, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>> {
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             ORDER BY updated_at IS NULL, updated_at DESC, graph_id
             LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map([limit], map_conversation_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All conversation ids, for "did you mean" suggestions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn conversation_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT graph_id FROM conversations ORDER BY graph_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Count conversations in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_conversations(&self) -> Result<usize> {
        self.count("conversations")
    }

    // ==================
    // Message Operations
    // ==================

    /// Insert or update a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (including a missing parent conversation).
    pub fn upsert_message(&self, rec: &Message) -> Result<()> {
        upsert_message(&self.conn, rec)?;
        Ok(())
    }

    /// Look up a message by `graph_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_message(&self, graph_id: &str) -> Result<Option<Message>> {
        let msg = self
            .conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE graph_id = ?1"),
                [graph_id],
                map_message_row,
            )
            .optional()?;
        Ok(msg)
    }

    /// Messages of one conversation in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn messages_for_conversation(&self, conversation_graph_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_graph_id = ?1
             ORDER BY ordinal, graph_id"
        ))?;
        let rows = stmt
            .query_map([conversation_graph_id], map_message_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count messages in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_messages(&self) -> Result<usize> {
        self.count("messages")
    }

    // ==================
    // Package Operations
    // ==================

    /// Upsert a conversation and all of its messages in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogWrite`] naming the conversation if any write
    /// fails; nothing from this package is committed in that case.
    pub fn persist_package(&mut self, conversation: &Conversation, messages: &[Message]) -> Result<()> {
        self.mutate("persist_package", |tx| {
            upsert_conversation(tx, conversation)?;
            for msg in messages {
                upsert_message(tx, msg)?;
            }
            Ok(())
        })
        .map_err(|source| Error::CatalogWrite {
            graph_id: conversation.graph_id.clone(),
            source,
        })
    }

    fn count(&self, table: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

// ==================
// Row Writers
// ==================

fn upsert_conversation(conn: &Connection, rec: &Conversation) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO conversations (graph_id, title, slug, url, created_at, updated_at,
            parent_graph_id, export_md_path, export_assets_path, content_hash, word_count,
            page_order, last_indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(graph_id) DO UPDATE SET
            title = excluded.title,
            slug = excluded.slug,
            url = excluded.url,
            created_at = COALESCE(conversations.created_at, excluded.created_at),
            updated_at = excluded.updated_at,
            parent_graph_id = excluded.parent_graph_id,
            export_md_path = excluded.export_md_path,
            export_assets_path = excluded.export_assets_path,
            content_hash = excluded.content_hash,
            word_count = excluded.word_count,
            page_order = excluded.page_order,
            last_indexed_at = excluded.last_indexed_at",
        rusqlite::params![
            rec.graph_id,
            rec.title,
            rec.slug,
            rec.url,
            rec.created_at,
            rec.updated_at,
            rec.parent_graph_id,
            rec.export_md_path,
            rec.export_assets_path,
            rec.content_hash,
            rec.word_count,
            rec.page_order,
            rec.last_indexed_at,
        ],
    )
}

fn upsert_message(conn: &Connection, rec: &Message) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO messages (graph_id, conversation_graph_id, title, slug, author, role,
            ordinal, created_at, updated_at, parent_graph_id, export_md_path,
            export_assets_path, content_hash, word_count, excerpt, last_indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(graph_id) DO UPDATE SET
            conversation_graph_id = excluded.conversation_graph_id,
            title = excluded.title,
            slug = excluded.slug,
            author = excluded.author,
            role = excluded.role,
            ordinal = excluded.ordinal,
            created_at = COALESCE(messages.created_at, excluded.created_at),
            updated_at = excluded.updated_at,
            parent_graph_id = excluded.parent_graph_id,
            export_md_path = excluded.export_md_path,
            export_assets_path = excluded.export_assets_path,
            content_hash = excluded.content_hash,
            word_count = excluded.word_count,
            excerpt = excluded.excerpt,
            last_indexed_at = excluded.last_indexed_at",
        rusqlite::params![
            rec.graph_id,
            rec.conversation_graph_id,
            rec.title,
            rec.slug,
            rec.author,
            rec.role,
            rec.ordinal,
            rec.created_at,
            rec.updated_at,
            rec.parent_graph_id,
            rec.export_md_path,
            rec.export_assets_path,
            rec.content_hash,
            rec.word_count,
            rec.excerpt,
            rec.last_indexed_at,
        ],
    )
}

// ==================
// Row Mappers
// ==================

const CONVERSATION_COLUMNS: &str = "graph_id, title, slug, url, created_at, updated_at, \
    parent_graph_id, export_md_path, export_assets_path, content_hash, word_count, \
    page_order, last_indexed_at";

const MESSAGE_COLUMNS: &str = "graph_id, conversation_graph_id, title, slug, author, role, \
    ordinal, created_at, updated_at, parent_graph_id, export_md_path, export_assets_path, \
    content_hash, word_count, excerpt, last_indexed_at";

fn map_conversation_row(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        graph_id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        parent_graph_id: row.get(6)?,
        export_md_path: row.get(7)?,
        export_assets_path: row.get(8)?,
        content_hash: row.get(9)?,
        word_count: row.get(10)?,
        page_order: row.get(11)?,
        last_indexed_at: row.get(12)?,
    })
}

fn map_message_row(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    Ok(Message {
        graph_id: row.get(0)?,
        conversation_graph_id: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        author: row.get(4)?,
        role: row.get(5)?,
        ordinal: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        parent_graph_id: row.get(9)?,
        export_md_path: row.get(10)?,
        export_assets_path: row.get(11)?,
        content_hash: row.get(12)?,
        word_count: row.get(13)?,
        excerpt: row.get(14)?,
        last_indexed_at: row.get(15)?,
    })
}

// ==================
// Data Structures
// ==================

/// A conversation row.
///
/// `updated_at` holds the effective timestamp: the latest of the
/// conversation's own `updated_at` and every message's. The skip gate and
/// the since filter compare against this value.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Conversation {
    pub graph_id: String,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
    /// Latest of the conversation's and its messages' `updated_at`.
    pub updated_at: Option<String>,
    pub parent_graph_id: Option<String>,
    pub export_md_path: Option<String>,
    pub export_assets_path: Option<String>,
    pub content_hash: Option<String>,
    pub word_count: Option<i64>,
    pub page_order: Option<i64>,
    pub last_indexed_at: Option<String>,
}

/// A message row.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub graph_id: String,
    pub conversation_graph_id: String,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub author: Option<String>,
    pub role: Option<String>,
    pub ordinal: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub parent_graph_id: Option<String>,
    pub export_md_path: Option<String>,
    pub export_assets_path: Option<String>,
    pub content_hash: Option<String>,
    pub word_count: Option<i64>,
    pub excerpt: Option<String>,
    pub last_indexed_at: Option<String>,
}
