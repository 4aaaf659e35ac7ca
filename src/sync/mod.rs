//! Archive materialization and incremental sync.
//!
//! - **Hashing**: normalized SHA-256 content hashes and the skip gate
//! - **Export**: conversation packages → Markdown + JSONL + catalog rows
//! - **Import**: `merged.jsonl` → conversation packages (index-only rebuild)
//! - **Controller**: live and index-only runs with per-item failure isolation
//! - **Status**: archive vs. catalog comparison
//!
//! # File Format
//!
//! Each JSONL line is one record with a `type` tag:
//! ```json
//! {"type":"message","conversation_graph_id":"chat-1","graph_id":"m1","ordinal":1,...,"content":"Hello bot"}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cv::config::SyncConfig;
//! use cv::sync::SyncController;
//!
//! let mut controller = SyncController::open(SyncConfig::new("output"))?;
//! let report = controller.run_index_only()?;
//! println!("{} conversations rebuilt", report.processed.len());
//! ```

mod controller;
mod export;
mod file;
mod hash;
mod import;
mod status;
mod types;

pub use controller::SyncController;
pub use export::{
    EXCERPT_MAX_CHARS, ExportOptions, Materializer, SLUG_MAX_LEN, compute_excerpt, derive_slug,
    message_slug, render_markdown,
};
pub use file::{atomic_write, count_lines, file_size, read_jsonl, write_jsonl};
pub use hash::{StoredState, aggregate_text, content_hash, normalize, should_skip, word_count};
pub use import::{MERGED_FILE, find_archives, load_archived, scan_archive};
pub use status::{ArchiveStatus, get_archive_status, print_status};
pub use types::{
    ArchiveRecord, ExportOutcome, ExportPaths, ItemNote, MessageRecord, SectionRecord, SkipReason,
    SyncError, SyncReport, SyncResult, WrittenPaths,
};
