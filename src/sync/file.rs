//! Atomic file operations for the archive.
//!
//! Every archive file is written to a sibling temp file, synced, then renamed
//! into place, so a crash never leaves a half-written `merged.jsonl` behind.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::sync::types::{SyncError, SyncResult};

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file (the target name plus `.tmp`)
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let temp_path = temp_path_for(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write records to a JSONL file atomically, one JSON object per line.
///
/// Text is written as UTF-8 without ASCII escaping.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or the file cannot be written.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> SyncResult<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&serde_json::to_string(record)?);
        content.push('\n');
    }
    atomic_write(path, &content)
}

/// Read all records from a JSONL file.
///
/// Blank lines are ignored. Invalid lines cause an error with the line
/// number for debugging.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist or cannot be opened
/// - Any line cannot be parsed as `T`
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> SyncResult<Vec<T>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|e| SyncError::InvalidRecord {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Count the number of non-blank lines in a JSONL file.
///
/// Returns 0 if the file doesn't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn count_lines(path: &Path) -> SyncResult<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let reader = BufReader::new(File::open(path)?);
    let count = reader
        .lines()
        .map_while(std::result::Result::ok)
        .filter(|l| !l.trim().is_empty())
        .count();
    Ok(count)
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
#[must_use]
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Line {
        id: String,
        text: String,
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("conversation.md");

        atomic_write(&path, "# Title\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "# Title\n");
        assert!(!temp_dir.path().join("nested").join("conversation.md.tmp").exists());
    }

    #[test]
    fn test_jsonl_preserves_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("merged.jsonl");

        let lines = vec![
            Line { id: "a".into(), text: "naïve café ✓".into() },
            Line { id: "b".into(), text: "line\nbreak".into() },
        ];
        write_jsonl(&path, &lines).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("naïve café ✓"));
        assert_eq!(raw.lines().count(), 2);

        let back: Vec<Line> = read_jsonl(&path).unwrap();
        assert_eq!(back, lines);
    }

    #[test]
    fn test_read_jsonl_reports_line_number() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        fs::write(&path, "{\"id\":\"a\",\"text\":\"x\"}\n\nnot json\n").unwrap();

        let err = read_jsonl::<Line>(&path).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord { line: 3, .. }));
    }

    #[test]
    fn test_count_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        assert_eq!(count_lines(&path).unwrap(), 0);

        fs::write(&path, "line1\nline2\n\nline3\n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 3);
    }

    #[test]
    fn test_file_not_found() {
        let result = read_jsonl::<Line>(Path::new("/nonexistent/file.jsonl"));
        assert!(matches!(result, Err(SyncError::FileNotFound(_))));
    }
}
