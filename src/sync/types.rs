//! Archive record types.
//!
//! These are the lines written to `merged.jsonl` and `section.jsonl`, plus
//! the outcome and report types returned by the materializer and the
//! controller.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tagged union for archive JSONL records.
///
/// The serde tag attribute makes each line look like:
/// `{"type":"message","graph_id":"m1",...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArchiveRecord {
    /// One message with full content (`merged.jsonl`).
    Message(MessageRecord),
    /// One message's metadata without content (`section.jsonl`).
    Section(SectionRecord),
}

/// Paths recorded alongside each exported message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPaths {
    /// Markdown file that renders this message.
    pub md: Option<String>,
    /// Opaque attachment directory for the conversation.
    pub assets: Option<String>,
}

/// A message line in `merged.jsonl`.
///
/// Carries the conversation-level fields too, so the catalog can be rebuilt
/// from the archive alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub conversation_graph_id: String,
    #[serde(default)]
    pub conversation_title: Option<String>,
    #[serde(default)]
    pub conversation_url: Option<String>,
    #[serde(default)]
    pub conversation_parent_graph_id: Option<String>,
    #[serde(default)]
    pub conversation_created_at: Option<String>,
    #[serde(default)]
    pub conversation_page_order: Option<i64>,

    pub graph_id: String,
    pub title: Option<String>,
    pub section_title: Option<String>,
    pub section_slug: String,
    pub ordinal: i64,
    pub author: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub parent_graph_id: Option<String>,
    pub export_paths: ExportPaths,
    pub content_hash: String,
    pub word_count: usize,
    pub excerpt: String,
    pub content: String,
}

/// The single line in a message's `section.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub conversation_graph_id: String,
    pub graph_id: String,
    pub section_title: Option<String>,
    pub section_slug: String,
    pub ordinal: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub export_paths: ExportPaths,
    pub content_hash: String,
    pub word_count: usize,
    pub excerpt: String,
}

/// Why an export call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The conversation was last updated before the since cutoff.
    SinceFilter,
    /// The catalog already holds this content.
    Unchanged,
}

impl SkipReason {
    /// Reason string used in reports (`since-filter` / `unchanged`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SinceFilter => "since-filter",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files and directories written by one export call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WrittenPaths {
    pub conversation_dir: PathBuf,
    pub md: Option<PathBuf>,
    pub merged_jsonl: Option<PathBuf>,
    pub assets: PathBuf,
    pub sections: Vec<PathBuf>,
}

/// Result of `export_conversation_package`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub graph_id: String,
    pub skipped: bool,
    pub reason: Option<SkipReason>,
    pub slug: Option<String>,
    pub messages: usize,
    pub export_paths: Option<WrittenPaths>,
}

impl ExportOutcome {
    /// An outcome for a skipped conversation.
    #[must_use]
    pub fn skipped(graph_id: &str, reason: SkipReason) -> Self {
        Self {
            graph_id: graph_id.to_string(),
            skipped: true,
            reason: Some(reason),
            slug: None,
            messages: 0,
            export_paths: None,
        }
    }
}

/// One skipped or failed item, with a reason for later triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemNote {
    pub graph_id: String,
    pub reason: String,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Conversations exported (files and/or catalog rows written).
    pub processed: Vec<String>,
    /// Conversations skipped, with reason.
    pub skipped: Vec<ItemNote>,
    /// Conversations that failed, with reason.
    pub errored: Vec<ItemNote>,
    /// References discovered by the acquisition engine (live mode).
    pub discovered: usize,
    /// Why scanning stopped (live mode).
    pub stop_reason: Option<String>,
}

impl SyncReport {
    /// Returns true if any item failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errored.is_empty()
    }

    /// Total items seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.errored.len()
    }

    /// Record an export outcome.
    pub fn record(&mut self, outcome: &ExportOutcome) {
        match outcome.reason {
            Some(reason) if outcome.skipped => self.skipped.push(ItemNote {
                graph_id: outcome.graph_id.clone(),
                reason: reason.to_string(),
            }),
            _ => self.processed.push(outcome.graph_id.clone()),
        }
    }

    /// Record a per-item failure.
    pub fn record_error(&mut self, graph_id: &str, reason: impl Into<String>) {
        self.errored.push(ItemNote {
            graph_id: graph_id.to_string(),
            reason: reason.into(),
        });
    }
}

/// Archive file errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive file or directory not found.
    #[error("Archive path not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid record format.
    #[error("Invalid record at line {line}: {message}")]
    InvalidRecord {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },
}

/// Result type for archive file operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
