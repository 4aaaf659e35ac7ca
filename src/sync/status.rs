//! Archive and catalog status.
//!
//! Compares what is on disk with what the catalog holds, so an operator can
//! see the filesystem-ahead-of-catalog window after an interrupted run.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::Result;
use crate::storage::CatalogStore;
use crate::sync::file::file_size;
use crate::sync::import::find_archives;

/// Snapshot of archive and catalog contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveStatus {
    /// Whether a catalog database was opened.
    pub catalog_present: bool,
    pub catalog_conversations: usize,
    pub catalog_messages: usize,

    /// Conversation directories holding a `merged.jsonl`.
    pub archived_conversations: usize,
    /// Total `section.jsonl` files.
    pub archived_sections: usize,
    /// Total bytes under the archive root.
    pub archive_bytes: u64,

    /// Archived conversation ids with no catalog row.
    pub missing_from_catalog: Vec<String>,
}

impl ArchiveStatus {
    /// True when the archive holds conversations the catalog does not.
    #[must_use]
    pub fn archive_ahead(&self) -> bool {
        !self.missing_from_catalog.is_empty()
    }
}

/// Gather archive and catalog counts.
///
/// A missing archive directory counts as empty.
///
/// # Errors
///
/// Returns an error if a catalog query fails.
pub fn get_archive_status(catalog: Option<&CatalogStore>, output_dir: &Path) -> Result<ArchiveStatus> {
    let mut status = ArchiveStatus::default();

    if let Some(catalog) = catalog {
        status.catalog_present = true;
        status.catalog_conversations = catalog.count_conversations()?;
        status.catalog_messages = catalog.count_messages()?;
    }

    if !output_dir.is_dir() {
        return Ok(status);
    }

    for entry in WalkDir::new(output_dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            status.archive_bytes += file_size(entry.path());
            if entry.file_name() == "section.jsonl" {
                status.archived_sections += 1;
            }
        }
    }

    for merged in find_archives(output_dir)? {
        status.archived_conversations += 1;
        let Some(owner) = first_conversation_id(&merged) else {
            continue;
        };
        let known = match catalog {
            Some(catalog) => catalog.get_conversation(&owner)?.is_some(),
            None => false,
        };
        if !known {
            status.missing_from_catalog.push(owner);
        }
    }

    Ok(status)
}

fn first_conversation_id(merged: &Path) -> Option<String> {
    let text = std::fs::read_to_string(merged).ok()?;
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value
        .get("conversation_graph_id")?
        .as_str()
        .map(str::to_string)
}

/// Print status to stdout in a human-readable format.
pub fn print_status(status: &ArchiveStatus, output_dir: &Path, db_path: Option<&Path>) {
    println!("{}", "Archive Status".bold().underline());
    println!();

    println!("{}", "Catalog:".blue().bold());
    match db_path {
        Some(path) if status.catalog_present => {
            println!("  Path:          {}", path.display());
            println!("  Conversations: {}", status.catalog_conversations);
            println!("  Messages:      {}", status.catalog_messages);
        }
        _ => println!("  {}", "(not built)".dimmed()),
    }
    println!();

    println!("{}", "Archive:".blue().bold());
    println!("  Path:          {}", output_dir.display());
    if status.archived_conversations == 0 {
        println!("  {}", "No exported conversations.".dimmed());
    } else {
        println!("  Conversations: {}", status.archived_conversations);
        println!("  Sections:      {}", status.archived_sections);
        println!("  Size:          {}", format_size(status.archive_bytes));
    }
    println!();

    if status.archive_ahead() {
        println!(
            "{}",
            format!(
                "{} archived conversation(s) missing from the catalog.",
                status.missing_from_catalog.len()
            )
            .yellow()
            .bold()
        );
        for id in status.missing_from_catalog.iter().take(10) {
            println!("  {id}");
        }
        println!();
        println!(
            "{}",
            "Run 'cv sync --index-only' to rebuild catalog rows from the archive.".dimmed()
        );
    } else if status.archived_conversations > 0 {
        println!("{}", "Catalog is in step with the archive.".green());
    }
}

/// Format a byte size as a human-readable string.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConversationInput, MessageInput};
    use crate::sync::export::{ExportOptions, Materializer};
    use tempfile::TempDir;

    fn export(dir: &Path, catalog: Option<&mut CatalogStore>, id: &str, title: &str) {
        let conv = ConversationInput::new(id, title);
        let msgs = vec![
            MessageInput::new(format!("{id}-m1"), 1, "question"),
            MessageInput::new(format!("{id}-m2"), 2, "answer"),
        ];
        Materializer::new(catalog, dir)
            .export_conversation_package(&conv, &msgs, ExportOptions::default())
            .unwrap();
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_status_empty() {
        let temp_dir = TempDir::new().unwrap();
        let status = get_archive_status(None, &temp_dir.path().join("missing")).unwrap();
        assert!(!status.catalog_present);
        assert_eq!(status.archived_conversations, 0);
        assert!(!status.archive_ahead());
    }

    #[test]
    fn test_status_counts_and_detects_gap() {
        let temp_dir = TempDir::new().unwrap();
        let mut catalog = CatalogStore::open_memory().unwrap();

        export(temp_dir.path(), Some(&mut catalog), "chat-1", "First");
        // Written to disk only: the catalog never saw it
        export(temp_dir.path(), None, "chat-2", "Second");

        let status = get_archive_status(Some(&catalog), temp_dir.path()).unwrap();
        assert_eq!(status.catalog_conversations, 1);
        assert_eq!(status.catalog_messages, 2);
        assert_eq!(status.archived_conversations, 2);
        assert_eq!(status.archived_sections, 4);
        assert!(status.archive_bytes > 0);
        assert_eq!(status.missing_from_catalog, vec!["chat-2".to_string()]);
        assert!(status.archive_ahead());
    }
}
