//! Show command implementation.

use crate::error::{Error, Result};
use crate::storage::{CatalogStore, Conversation, Message};
use crate::sync::{MERGED_FILE, count_lines};
use crate::validate::find_similar_ids;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::resolve_paths;

#[derive(Serialize)]
struct ShowOutput {
    conversation: Conversation,
    messages: Vec<Message>,
    archived_messages: Option<usize>,
}

/// Execute the show command.
///
/// # Errors
///
/// Returns [`Error::ConversationNotFound`] (with close matches when any
/// exist) if the catalog has no such conversation.
pub fn execute(
    graph_id: &str,
    output_dir: Option<&PathBuf>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let (paths, _) = resolve_paths(output_dir, db_path)?;
    if !paths.db_path.is_file() {
        return Err(Error::ConversationNotFound {
            graph_id: graph_id.to_string(),
            similar: Vec::new(),
        });
    }

    let catalog = CatalogStore::open(&paths.db_path)?;
    let Some(conversation) = catalog.get_conversation(graph_id)? else {
        let similar = find_similar_ids(graph_id, &catalog.conversation_ids()?, 3);
        return Err(Error::ConversationNotFound {
            graph_id: graph_id.to_string(),
            similar,
        });
    };
    let messages = catalog.messages_for_conversation(graph_id)?;

    // Lines in merged.jsonl, next to conversation.md
    let archived_messages = conversation
        .export_md_path
        .as_deref()
        .and_then(|md| Path::new(md).parent().map(|dir| dir.join(MERGED_FILE)))
        .filter(|merged| merged.is_file())
        .and_then(|merged| count_lines(&merged).ok());

    if json {
        let output = ShowOutput {
            conversation,
            messages,
            archived_messages,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let title = conversation.title.as_deref().unwrap_or("(untitled)");
    println!("{}", title.bold());
    println!("  ID:       {}", conversation.graph_id);
    if let Some(slug) = &conversation.slug {
        println!("  Slug:     {slug}");
    }
    if let Some(url) = &conversation.url {
        println!("  URL:      {url}");
    }
    println!(
        "  Created:  {}",
        conversation.created_at.as_deref().unwrap_or("-")
    );
    println!(
        "  Updated:  {}",
        conversation.updated_at.as_deref().unwrap_or("-")
    );
    println!("  Words:    {}", conversation.word_count.unwrap_or(0));
    if let Some(md) = &conversation.export_md_path {
        println!("  Markdown: {md}");
    }
    if let Some(n) = archived_messages {
        if n != messages.len() {
            println!(
                "  {}",
                format!("Archive holds {n} message(s), catalog {}", messages.len()).yellow()
            );
        }
    }
    println!();

    println!("{}", format!("Messages ({})", messages.len()).blue().bold());
    for msg in &messages {
        let who = msg
            .author
            .as_deref()
            .or(msg.role.as_deref())
            .unwrap_or("unknown");
        println!(
            "  [{}] {}: {}",
            msg.ordinal.unwrap_or_default(),
            who.cyan(),
            msg.excerpt.as_deref().unwrap_or("").dimmed()
        );
    }

    Ok(())
}
