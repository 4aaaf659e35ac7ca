//! Conversation and message records at the ingestion boundary.
//!
//! Fetchers (the browser message source, or archived `merged.jsonl` files)
//! produce loosely typed `Raw*` records. They are validated once, in
//! [`crate::validate`], into `*Input` records that the export materializer
//! can trust: ids present, timestamps parseable, ordinals strictly increasing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp::parse_opt;

/// A conversation as delivered by a fetcher, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConversation {
    pub graph_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub parent_graph_id: Option<String>,

    /// Position in the discovered conversation list (0-based)
    pub page_order: Option<i64>,

    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// A message as delivered by a fetcher, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    pub graph_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub role: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub ordinal: Option<i64>,
    pub parent_graph_id: Option<String>,
}

/// A validated conversation, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationInput {
    /// Stable unique key (never reused)
    pub graph_id: String,

    /// Display title; may be empty, in which case the slug falls back
    pub title: String,

    pub url: Option<String>,

    /// ISO8601 creation timestamp, as received
    pub created_at: Option<String>,

    /// ISO8601 update timestamp, as received
    pub updated_at: Option<String>,

    pub parent_graph_id: Option<String>,
    pub page_order: Option<i64>,

    /// Directory name to reuse instead of deriving one from the title.
    ///
    /// Set by the index-only rebuild, which must keep the on-disk layout.
    pub slug_hint: Option<String>,
}

/// A validated message, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInput {
    pub graph_id: String,
    pub title: Option<String>,
    pub author: Option<String>,

    /// Canonical role: `user`, `assistant`, `system` or `tool`
    pub role: Option<String>,

    pub content: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,

    /// 1-based position within the conversation
    pub ordinal: i64,

    pub parent_graph_id: Option<String>,
}

impl ConversationInput {
    /// Create a minimal conversation input.
    pub fn new(graph_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            title: title.into(),
            url: None,
            created_at: None,
            updated_at: None,
            parent_graph_id: None,
            page_order: None,
            slug_hint: None,
        }
    }

    /// The latest of the conversation's own `updated_at` and every message's,
    /// as the original text.
    #[must_use]
    pub fn latest_updated_at<'a>(&'a self, messages: &'a [MessageInput]) -> Option<&'a str> {
        messages
            .iter()
            .filter_map(|m| m.updated_at.as_deref())
            .chain(self.updated_at.as_deref())
            .filter_map(|ts| parse_opt(Some(ts)).map(|parsed| (parsed, ts)))
            .max_by_key(|(parsed, _)| *parsed)
            .map(|(_, ts)| ts)
    }

    /// Parsed form of [`Self::latest_updated_at`].
    ///
    /// This is the timestamp compared against the since cutoff and against
    /// the stored record when deciding whether to skip.
    #[must_use]
    pub fn effective_updated_at(&self, messages: &[MessageInput]) -> Option<DateTime<Utc>> {
        parse_opt(self.latest_updated_at(messages))
    }
}

impl MessageInput {
    /// Create a minimal message input.
    pub fn new(graph_id: impl Into<String>, ordinal: i64, content: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            title: None,
            author: None,
            role: None,
            content: content.into(),
            created_at: None,
            updated_at: None,
            ordinal,
            parent_graph_id: None,
        }
    }

    /// Builder-style role setter.
    #[must_use]
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Builder-style updated_at setter.
    #[must_use]
    pub fn with_updated_at(mut self, ts: &str) -> Self {
        self.updated_at = Some(ts.to_string());
        self
    }
}
