//! Export materializer.
//!
//! Renders one conversation into its archive directory and mirrors it into
//! the catalog:
//!
//! ```text
//! <output>/<conversation-slug>/
//!     conversation.md
//!     merged.jsonl            every message, full content
//!     assets/                 opaque attachments, never touched here
//!     <message-slug>/section.jsonl
//! ```
//!
//! # Idempotence
//!
//! Before any file is written the aggregate content hash is compared with
//! the catalog record (see [`should_skip`]). A second call with unchanged
//! input returns `skipped` and performs no writes at all.
//!
//! # Consistency
//!
//! Files are written first, then the catalog package is committed in one
//! transaction. A failure between the two leaves the archive ahead of the
//! catalog; `cv sync --index-only` rebuilds the catalog from the archive.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::SincePolicy;
use crate::error::{Error, Result};
use crate::model::{ConversationInput, MessageInput, now_iso};
use crate::storage::{CatalogStore, Conversation, Message};
use crate::sync::file::{atomic_write, write_jsonl};
use crate::sync::hash::{StoredState, aggregate_text, content_hash, should_skip, word_count};
use crate::sync::types::{
    ArchiveRecord, ExportOutcome, ExportPaths, MessageRecord, SectionRecord, SkipReason,
    SyncResult, WrittenPaths,
};
use crate::sync::import::MERGED_FILE;
use crate::validate::verify_ordinals;

/// Default maximum slug length.
pub const SLUG_MAX_LEN: usize = 64;

/// Default excerpt length in characters.
pub const EXCERPT_MAX_CHARS: usize = 180;

const UNTITLED_CONVERSATION: &str = "Untitled Conversation";

/// Options for one export call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Skip conversations last updated before this instant.
    pub since: Option<DateTime<Utc>>,
    /// Which conversations the since cutoff applies to.
    pub since_policy: SincePolicy,
    /// Rebuild catalog rows only; never write archive files.
    pub index_only: bool,
}

/// Derive a filesystem-safe slug.
///
/// Lower-cases, replaces runs of anything but `a-z0-9` with one hyphen,
/// trims hyphens, and truncates to `max_len`. Empty input gives `untitled`.
#[must_use]
pub fn derive_slug(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("untitled");
    }

    // Slug is pure ASCII here, so byte truncation is char-safe
    slug.truncate(max_len);
    slug.trim_end_matches('-').to_string()
}

/// Slug for a message: zero-padded ordinal plus its title or first line.
#[must_use]
pub fn message_slug(msg: &MessageInput, position: usize) -> String {
    let source = msg
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&msg.content);
    let first_line: String = source
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(80)
        .collect();

    let fallback = if first_line.trim().is_empty() {
        format!("message-{position}")
    } else {
        first_line
    };

    derive_slug(&format!("{:03}-{fallback}", msg.ordinal), SLUG_MAX_LEN)
}

/// Whitespace-collapsed excerpt, ellipsized when longer than `max_chars`.
#[must_use]
pub fn compute_excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Render the canonical Markdown document for a conversation.
///
/// An H1 title, then per message an H2 `[ordinal] author — timestamp`
/// followed by the raw content. Ends with exactly one newline.
#[must_use]
pub fn render_markdown(conversation: &ConversationInput, messages: &[MessageInput]) -> String {
    let mut parts = vec![format!("# {}", display_title(conversation))];

    for msg in messages {
        let author = msg
            .author
            .as_deref()
            .or(msg.role.as_deref())
            .unwrap_or("unknown");
        let ts = msg.created_at.as_deref().unwrap_or_default();
        parts.push(format!("\n## [{}] {author} — {ts}\n", msg.ordinal));
        parts.push(msg.content.clone());
    }

    format!("{}\n", parts.join("\n").trim())
}

fn display_title(conversation: &ConversationInput) -> &str {
    if conversation.title.trim().is_empty() {
        UNTITLED_CONVERSATION
    } else {
        &conversation.title
    }
}

/// Per-message values derived before any write.
struct PreparedMessage<'m> {
    input: &'m MessageInput,
    slug: String,
    content_hash: String,
    word_count: usize,
    excerpt: String,
    parent_graph_id: Option<String>,
}

fn prepare_messages<'m>(
    conversation: &ConversationInput,
    messages: &'m [MessageInput],
) -> Vec<PreparedMessage<'m>> {
    messages
        .iter()
        .enumerate()
        .map(|(idx, msg)| PreparedMessage {
            input: msg,
            slug: message_slug(msg, idx + 1),
            content_hash: content_hash(&msg.content),
            word_count: word_count(&msg.content),
            excerpt: compute_excerpt(&msg.content, EXCERPT_MAX_CHARS),
            parent_graph_id: if idx == 0 {
                conversation.parent_graph_id.clone()
            } else {
                Some(messages[idx - 1].graph_id.clone())
            },
        })
        .collect()
}

/// Writes conversation packages to the archive and the catalog.
///
/// The catalog is optional: without one, packages are only written to disk
/// and nothing is ever skipped as unchanged.
pub struct Materializer<'a> {
    catalog: Option<&'a mut CatalogStore>,
    output_dir: PathBuf,
}

impl<'a> Materializer<'a> {
    /// Create a materializer writing under `output_dir`.
    #[must_use]
    pub fn new(catalog: Option<&'a mut CatalogStore>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            output_dir: output_dir.into(),
        }
    }

    /// Get the archive root.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export one conversation package.
    ///
    /// Returns `skipped` with reason `since-filter` or `unchanged` when no
    /// work was needed; otherwise the written paths.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Validation`] if message ordinals are not strictly increasing
    /// - [`crate::Error::Io`] if an archive file cannot be written
    /// - [`crate::Error::CatalogWrite`] if the catalog package cannot be committed
    pub fn export_conversation_package(
        &mut self,
        conversation: &ConversationInput,
        messages: &[MessageInput],
        options: ExportOptions,
    ) -> Result<ExportOutcome> {
        let graph_id = conversation.graph_id.as_str();
        let effective_updated = conversation.effective_updated_at(messages);

        // 1. since cutoff, before any hashing
        if let (Some(since), Some(updated)) = (options.since, effective_updated) {
            if updated < since && self.since_applies(graph_id, options.since_policy)? {
                debug!(graph_id, %since, "older than cutoff");
                return Ok(ExportOutcome::skipped(graph_id, SkipReason::SinceFilter));
            }
        }

        // 2. derived per-message values
        verify_ordinals(messages)?;
        let prepared = prepare_messages(conversation, messages);

        // 3. conversation aggregates
        let conv_hash = content_hash(&aggregate_text(messages.iter().map(|m| m.content.as_str())));
        let conv_words: usize = prepared.iter().map(|p| p.word_count).sum();

        // 4. skip gate
        let existing = match self.catalog.as_deref() {
            Some(catalog) => catalog.get_conversation(graph_id)?,
            None => None,
        };
        let stored = existing.as_ref().map(|c| StoredState {
            content_hash: c.content_hash.as_deref(),
            updated_at: c.updated_at.as_deref(),
        });
        if should_skip(stored, &conv_hash, effective_updated) {
            debug!(graph_id, "unchanged since last pass");
            return Ok(ExportOutcome::skipped(graph_id, SkipReason::Unchanged));
        }

        let slug = self.resolve_slug(conversation, existing.as_ref());
        let conv_dir = self.output_dir.join(&slug);
        let md_path = conv_dir.join("conversation.md");
        let assets_dir = conv_dir.join("assets");

        // In index-only mode only paths that already exist are recorded
        let md_recorded = !options.index_only || md_path.is_file();
        let assets_recorded = !options.index_only || assets_dir.is_dir();
        let export_paths = ExportPaths {
            md: md_recorded.then(|| path_string(&md_path)),
            assets: assets_recorded.then(|| path_string(&assets_dir)),
        };

        // 5. archive files
        let mut written = WrittenPaths {
            conversation_dir: conv_dir.clone(),
            assets: assets_dir.clone(),
            ..WrittenPaths::default()
        };
        if !options.index_only {
            write_archive_files(conversation, messages, &prepared, &export_paths, &mut written)
                .map_err(|source| Error::ExportWrite {
                    graph_id: graph_id.to_string(),
                    source,
                })?;
        }

        // 6. catalog
        if let Some(catalog) = self.catalog.as_deref_mut() {
            let now = now_iso();
            let conv_row = Conversation {
                graph_id: graph_id.to_string(),
                title: Some(display_title(conversation).to_string()),
                slug: Some(slug.clone()),
                url: conversation.url.clone(),
                created_at: conversation.created_at.clone(),
                updated_at: conversation.latest_updated_at(messages).map(str::to_string),
                parent_graph_id: conversation.parent_graph_id.clone(),
                export_md_path: export_paths.md.clone(),
                export_assets_path: export_paths.assets.clone(),
                content_hash: Some(conv_hash),
                word_count: Some(to_i64(conv_words)),
                page_order: conversation.page_order,
                last_indexed_at: Some(now.clone()),
            };
            let msg_rows: Vec<Message> = prepared
                .iter()
                .map(|p| message_row(graph_id, p, &export_paths, &now))
                .collect();
            catalog.persist_package(&conv_row, &msg_rows)?;
        }

        info!(
            graph_id,
            slug = %slug,
            messages = messages.len(),
            index_only = options.index_only,
            "exported conversation"
        );

        // 7. done
        Ok(ExportOutcome {
            graph_id: graph_id.to_string(),
            skipped: false,
            reason: None,
            slug: Some(slug),
            messages: messages.len(),
            export_paths: Some(written),
        })
    }

    /// Whether the since cutoff gates this conversation under `policy`.
    fn since_applies(&self, graph_id: &str, policy: SincePolicy) -> Result<bool> {
        match (policy, self.catalog.as_deref()) {
            (SincePolicy::KnownOnly, Some(catalog)) => {
                Ok(catalog.get_conversation(graph_id)?.is_some())
            }
            _ => Ok(true),
        }
    }

    /// Pick the conversation's directory name.
    ///
    /// Order: existing catalog slug → caller-provided hint → slug of the
    /// title. A derived slug whose directory belongs to a different
    /// conversation is suffixed with the graph id.
    fn resolve_slug(&self, conversation: &ConversationInput, existing: Option<&Conversation>) -> String {
        if let Some(slug) = existing.and_then(|c| c.slug.clone()).filter(|s| !s.is_empty()) {
            return slug;
        }
        if let Some(hint) = conversation.slug_hint.clone().filter(|s| !s.is_empty()) {
            return hint;
        }

        let slug = derive_slug(display_title(conversation), SLUG_MAX_LEN);
        match archived_owner(&self.output_dir.join(&slug)) {
            Some(owner) if owner != conversation.graph_id => {
                let suffixed = format!(
                    "{}-{}",
                    slug,
                    derive_slug(&conversation.graph_id, SLUG_MAX_LEN)
                );
                debug!(slug = %slug, owner = %owner, "slug taken, using {suffixed}");
                suffixed
            }
            _ => slug,
        }
    }
}

/// Write `conversation.md`, `merged.jsonl` and every `section.jsonl` under
/// `written.conversation_dir`, recording each path as it lands.
fn write_archive_files(
    conversation: &ConversationInput,
    messages: &[MessageInput],
    prepared: &[PreparedMessage<'_>],
    export_paths: &ExportPaths,
    written: &mut WrittenPaths,
) -> SyncResult<()> {
    fs::create_dir_all(&written.assets)?;

    let md_path = written.conversation_dir.join("conversation.md");
    atomic_write(&md_path, &render_markdown(conversation, messages))?;
    written.md = Some(md_path);

    let merged_path = written.conversation_dir.join(MERGED_FILE);
    let merged: Vec<ArchiveRecord> = prepared
        .iter()
        .map(|p| ArchiveRecord::Message(message_record(conversation, p, export_paths)))
        .collect();
    write_jsonl(&merged_path, &merged)?;
    written.merged_jsonl = Some(merged_path);

    for p in prepared {
        let section_path = written.conversation_dir.join(&p.slug).join("section.jsonl");
        let record = ArchiveRecord::Section(section_record(conversation, p, export_paths));
        write_jsonl(&section_path, std::slice::from_ref(&record))?;
        written.sections.push(section_path);
    }
    Ok(())
}

/// The conversation id recorded in an existing `merged.jsonl`, if any.
fn archived_owner(conv_dir: &Path) -> Option<String> {
    let text = fs::read_to_string(conv_dir.join("merged.jsonl")).ok()?;
    let first = text.lines().find(|l| !l.trim().is_empty())?;
    let value: serde_json::Value = serde_json::from_str(first).ok()?;
    value
        .get("conversation_graph_id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn message_record(
    conversation: &ConversationInput,
    p: &PreparedMessage<'_>,
    paths: &ExportPaths,
) -> MessageRecord {
    let msg = p.input;
    MessageRecord {
        conversation_graph_id: conversation.graph_id.clone(),
        conversation_title: Some(display_title(conversation).to_string()),
        conversation_url: conversation.url.clone(),
        conversation_parent_graph_id: conversation.parent_graph_id.clone(),
        conversation_created_at: conversation.created_at.clone(),
        conversation_page_order: conversation.page_order,
        graph_id: msg.graph_id.clone(),
        title: msg.title.clone(),
        section_title: msg.title.clone(),
        section_slug: p.slug.clone(),
        ordinal: msg.ordinal,
        author: msg.author.clone(),
        role: msg.role.clone(),
        created_at: msg.created_at.clone(),
        updated_at: msg.updated_at.clone(),
        parent_graph_id: p.parent_graph_id.clone(),
        export_paths: paths.clone(),
        content_hash: p.content_hash.clone(),
        word_count: p.word_count,
        excerpt: p.excerpt.clone(),
        content: msg.content.clone(),
    }
}

fn section_record(
    conversation: &ConversationInput,
    p: &PreparedMessage<'_>,
    paths: &ExportPaths,
) -> SectionRecord {
    let msg = p.input;
    SectionRecord {
        conversation_graph_id: conversation.graph_id.clone(),
        graph_id: msg.graph_id.clone(),
        section_title: msg.title.clone(),
        section_slug: p.slug.clone(),
        ordinal: msg.ordinal,
        created_at: msg.created_at.clone(),
        updated_at: msg.updated_at.clone(),
        export_paths: paths.clone(),
        content_hash: p.content_hash.clone(),
        word_count: p.word_count,
        excerpt: p.excerpt.clone(),
    }
}

fn message_row(
    conversation_graph_id: &str,
    p: &PreparedMessage<'_>,
    paths: &ExportPaths,
    now: &str,
) -> Message {
    let msg = p.input;
    Message {
        graph_id: msg.graph_id.clone(),
        conversation_graph_id: conversation_graph_id.to_string(),
        title: msg.title.clone(),
        slug: Some(p.slug.clone()),
        author: msg.author.clone(),
        role: msg.role.clone(),
        ordinal: Some(msg.ordinal),
        created_at: msg.created_at.clone(),
        updated_at: msg.updated_at.clone(),
        parent_graph_id: p.parent_graph_id.clone(),
        export_md_path: paths.md.clone(),
        export_assets_path: paths.assets.clone(),
        content_hash: Some(p.content_hash.clone()),
        word_count: Some(to_i64(p.word_count)),
        excerpt: Some(p.excerpt.clone()),
        last_indexed_at: Some(now.to_string()),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
