//! Status command implementation.

use crate::error::Result;
use crate::storage::CatalogStore;
use crate::sync::{get_archive_status, print_status, ArchiveStatus};
use serde::Serialize;
use std::path::PathBuf;

use super::resolve_paths;

#[derive(Serialize)]
struct StatusOutput {
    output_dir: PathBuf,
    db_path: Option<PathBuf>,
    #[serde(flatten)]
    status: ArchiveStatus,
    recent: Vec<RecentConversation>,
}

#[derive(Serialize)]
struct RecentConversation {
    graph_id: String,
    title: Option<String>,
    updated_at: Option<String>,
}

/// Execute status command.
///
/// The catalog is only read if it already exists; status never creates one.
pub fn execute(
    output_dir: Option<&PathBuf>,
    db_path: Option<&PathBuf>,
    recent: usize,
    json: bool,
) -> Result<()> {
    let (paths, _) = resolve_paths(output_dir, db_path)?;

    let catalog = if paths.db_path.is_file() {
        Some(CatalogStore::open(&paths.db_path)?)
    } else {
        None
    };
    let status = get_archive_status(catalog.as_ref(), &paths.output_dir)?;

    let recent: Vec<RecentConversation> = match (&catalog, recent) {
        (Some(catalog), n) if n > 0 => catalog
            .list_conversations(Some(n))?
            .into_iter()
            .map(|c| RecentConversation {
                graph_id: c.graph_id,
                title: c.title,
                updated_at: c.updated_at,
            })
            .collect(),
        _ => Vec::new(),
    };

    if json {
        let output = StatusOutput {
            output_dir: paths.output_dir,
            db_path: catalog.is_some().then_some(paths.db_path),
            status,
            recent,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let db_shown = catalog.is_some().then_some(paths.db_path.as_path());
    print_status(&status, &paths.output_dir, db_shown);

    if !recent.is_empty() {
        println!();
        println!("Recently updated:");
        for c in &recent {
            println!(
                "  {}  {}  {}",
                c.updated_at.as_deref().unwrap_or("-"),
                c.graph_id,
                c.title.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}
