//! Initialize an archive.
//!
//! Creates the archive root and applies the catalog schema. Both steps are
//! idempotent, so running `cv init` on an existing archive is harmless.

use crate::error::Result;
use crate::storage::CatalogStore;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use super::resolve_paths;

#[derive(Serialize)]
struct InitOutput {
    output_dir: PathBuf,
    database: PathBuf,
    created: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn execute(output_dir: Option<&PathBuf>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (paths, _) = resolve_paths(output_dir, db_path)?;
    let created = !paths.db_path.exists();

    fs::create_dir_all(&paths.output_dir)?;
    CatalogStore::ensure_schema(&paths.db_path)?;

    if json {
        let output = InitOutput {
            output_dir: paths.output_dir,
            database: paths.db_path,
            created,
        };
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else {
        if created {
            println!("Initialized chatvault archive");
        } else {
            println!("Archive already initialized (schema checked)");
        }
        println!("  Archive:  {}", paths.output_dir.display());
        println!("  Catalog:  {}", paths.db_path.display());
        println!();
        println!("Next: put your cookie tokens in a JSON file and run 'cv sync --tokens <file>'.");
    }

    Ok(())
}
