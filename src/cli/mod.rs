//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// chatvault - incremental archiver for threaded chat conversations
#[derive(Parser, Debug)]
#[command(name = "cv", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Catalog database path (default: <output-dir>/catalog.sqlite)
    #[arg(long, global = true, env = "CHATVAULT_DB")]
    pub db: Option<PathBuf>,

    /// Archive root directory (default: ./output)
    #[arg(long, global = true, env = "CHATVAULT_OUTPUT")]
    pub output_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the archive directory and catalog schema
    Init,

    /// Harvest conversations and update the archive and catalog
    Sync(SyncArgs),

    /// Compare the archive with the catalog
    Status {
        /// Number of recently updated conversations to list
        #[arg(long, default_value = "5")]
        recent: usize,
    },

    /// Show one catalogued conversation and its messages
    Show {
        /// Conversation graph id
        graph_id: String,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Rebuild the catalog from exported merged.jsonl files (no browser)
    #[arg(long)]
    pub index_only: bool,

    /// Skip conversations not updated since this ISO8601 timestamp
    #[arg(long)]
    pub since: Option<String>,

    /// Apply --since only to conversations already in the catalog
    #[arg(long, requires = "since")]
    pub since_known_only: bool,

    /// Write the archive only; do not open the catalog
    #[arg(long, conflicts_with = "index_only")]
    pub no_db: bool,

    /// JSON file of cookie tokens ({"p-b": "...", "p-lat": "..."})
    #[arg(long, env = "CHATVAULT_TOKENS")]
    pub tokens: Option<PathBuf>,

    /// Stop after discovering this many conversations
    #[arg(long)]
    pub limit: Option<usize>,

    /// Maximum scroll steps on the conversation list
    #[arg(long, default_value = "200")]
    pub max_scrolls: usize,

    /// Wall-clock budget for discovery, in seconds
    #[arg(long, default_value = "600")]
    pub max_time: u64,

    /// Pause after each scroll step, in milliseconds
    #[arg(long, default_value = "1500")]
    pub pause: u64,

    /// Seconds to wait for the list or a conversation page to render
    #[arg(long, default_value = "20")]
    pub timeout: u64,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// WebDriver endpoint (default: http://localhost:9515)
    #[arg(long, env = "CHATVAULT_WEBDRIVER")]
    pub webdriver: Option<String>,

    /// Write screenshot.png and page.html here if acquisition fails
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_flags_parse() {
        let cli = Cli::parse_from([
            "cv",
            "--output-dir",
            "/tmp/out",
            "sync",
            "--since",
            "2024-05-01",
            "--since-known-only",
            "--limit",
            "10",
        ]);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.since.as_deref(), Some("2024-05-01"));
        assert!(args.since_known_only);
        assert_eq!(args.limit, Some(10));
        assert_eq!(args.max_scrolls, 200);
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_index_only_conflicts_with_no_db() {
        let err = Cli::try_parse_from(["cv", "sync", "--index-only", "--no-db"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
