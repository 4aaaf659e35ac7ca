//! Index-only rebuild: archive → catalog.
//!
//! Scans `<output>/*/merged.jsonl`, reconstructs each conversation and its
//! messages from the archived lines, and feeds them back through the
//! materializer in index-only mode. Hashes and word counts are re-derived
//! from the archived content rather than trusted from the file. No browser
//! or network access is involved.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::{ConversationInput, MessageInput, RawConversation, RawMessage, parse_iso};
use crate::sync::file::read_jsonl;
use crate::sync::types::{ArchiveRecord, MessageRecord};
use crate::validate::validate_conversation;

/// File name of the per-conversation merged archive.
pub const MERGED_FILE: &str = "merged.jsonl";

/// Find every `merged.jsonl` exactly one directory below `output_dir`.
///
/// Results are sorted by path so rebuilds are deterministic.
///
/// # Errors
///
/// Returns [`Error::ArchiveNotFound`] if `output_dir` does not exist.
pub fn find_archives(output_dir: &Path) -> Result<Vec<PathBuf>> {
    if !output_dir.is_dir() {
        return Err(Error::ArchiveNotFound {
            path: output_dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = WalkDir::new(output_dir)
        .min_depth(2)
        .max_depth(2)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == MERGED_FILE)
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort();
    Ok(files)
}

/// Reconstruct a conversation from one `merged.jsonl`.
///
/// - slug: the containing directory name (kept as the on-disk layout)
/// - title: recorded conversation title, else the first section title,
///   else the slug title-cased
/// - created_at: the recorded conversation value, else the earliest message
/// - updated_at: latest over the messages
/// - page_order: as recorded
///
/// Returns `None` for a file with no message lines.
///
/// # Errors
///
/// Returns [`Error::UnreadableArchive`] if the file cannot be read or
/// parsed, or a validation error if it mixes conversations or fails
/// ingestion checks. Both are scoped to this one file.
pub fn load_archived(merged_path: &Path) -> Result<Option<(ConversationInput, Vec<MessageInput>)>> {
    let records: Vec<ArchiveRecord> =
        read_jsonl(merged_path).map_err(|source| Error::UnreadableArchive {
            path: merged_path.to_path_buf(),
            source,
        })?;
    let messages: Vec<MessageRecord> = records
        .into_iter()
        .filter_map(|r| match r {
            ArchiveRecord::Message(m) => Some(m),
            ArchiveRecord::Section(_) => None,
        })
        .collect();

    let Some(first) = messages.first() else {
        debug!(path = %merged_path.display(), "empty archive file");
        return Ok(None);
    };

    let graph_id = first.conversation_graph_id.clone();
    if let Some(stray) = messages.iter().find(|m| m.conversation_graph_id != graph_id) {
        return Err(Error::Validation(format!(
            "{}: message {} belongs to {}, expected {graph_id}",
            merged_path.display(),
            stray.graph_id,
            stray.conversation_graph_id
        )));
    }

    let slug = merged_path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let title = first
        .conversation_title
        .clone()
        .or_else(|| first.section_title.clone())
        .unwrap_or_else(|| title_from_slug(&slug));

    let raw = RawConversation {
        graph_id: Some(graph_id),
        title: Some(title),
        url: first.conversation_url.clone(),
        created_at: first.conversation_created_at.clone().or_else(|| {
            extreme_timestamp(messages.iter().map(|m| m.created_at.as_deref()), false)
        }),
        updated_at: extreme_timestamp(messages.iter().map(|m| m.updated_at.as_deref()), true),
        parent_graph_id: first.conversation_parent_graph_id.clone(),
        page_order: first.conversation_page_order,
        messages: messages.into_iter().map(raw_message).collect(),
    };

    let (mut conversation, messages) = validate_conversation(raw)?;
    conversation.slug_hint = Some(slug).filter(|s| !s.is_empty());
    Ok(Some((conversation, messages)))
}

/// Load every archived conversation, isolating per-file failures.
///
/// Each entry is the `merged.jsonl` path and either the reconstructed
/// conversation or the error that prevented it.
///
/// # Errors
///
/// Returns [`Error::ArchiveNotFound`] if `output_dir` does not exist.
pub fn scan_archive(output_dir: &Path) -> Result<Vec<(PathBuf, Result<(ConversationInput, Vec<MessageInput>)>)>> {
    let mut out = Vec::new();
    for path in find_archives(output_dir)? {
        match load_archived(&path) {
            Ok(Some(package)) => out.push((path, Ok(package))),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable archive");
                out.push((path, Err(e)));
            }
        }
    }
    Ok(out)
}

fn raw_message(m: MessageRecord) -> RawMessage {
    RawMessage {
        graph_id: Some(m.graph_id),
        title: m.section_title.or(m.title),
        author: m.author,
        role: m.role,
        content: Some(m.content),
        created_at: m.created_at,
        updated_at: m.updated_at,
        ordinal: Some(m.ordinal),
        parent_graph_id: m.parent_graph_id,
    }
}

/// Earliest (`latest == false`) or latest parseable timestamp, as stored.
fn extreme_timestamp<'a, I>(values: I, latest: bool) -> Option<String>
where
    I: Iterator<Item = Option<&'a str>>,
{
    let parsed = values.flatten().filter_map(|ts| parse_iso(ts).map(|p| (p, ts)));
    let pick = if latest {
        parsed.max_by_key(|(p, _)| *p)
    } else {
        parsed.min_by_key(|(p, _)| *p)
    };
    pick.map(|(_, ts)| ts.to_string())
}

/// `my-first-chat` → `My First Chat`.
fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
