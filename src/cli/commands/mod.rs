//! Command implementations.

pub mod completions;
pub mod init;
pub mod show;
pub mod status;
pub mod sync;
pub mod version;

use std::path::PathBuf;

use crate::config::{Settings, resolve_db_path, resolve_output_dir};
use crate::error::Result;

/// Archive root and catalog path after flag/env/settings resolution.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub output_dir: PathBuf,
    pub db_path: PathBuf,
}

/// Resolve the archive root and catalog path for a command.
///
/// # Errors
///
/// Returns an error if the settings file exists but is invalid.
pub fn resolve_paths(
    output_dir: Option<&PathBuf>,
    db_path: Option<&PathBuf>,
) -> Result<(ResolvedPaths, Settings)> {
    let settings = Settings::load()?;
    let output_dir = resolve_output_dir(output_dir.map(PathBuf::as_path), &settings);
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path), &settings, &output_dir);
    Ok((
        ResolvedPaths {
            output_dir,
            db_path,
        },
        settings,
    ))
}
