//! Content hashing and change detection.
//!
//! Text is normalized (whitespace collapsed, trimmed, lower-cased) before it
//! is hashed, so incidental formatting changes never count as new content.
//! `should_skip` is the single gate that makes repeated passes idempotent.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::model::timestamp::parse_opt;

/// Collapse whitespace runs to one space, trim, and lower-case.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA256 hex digest of `normalize(text)`.
///
/// # Example
///
/// ```ignore
/// assert_eq!(content_hash("Hello   World"), content_hash("  hello world  "));
/// ```
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Number of whitespace-delimited tokens (0 for blank text).
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Join message bodies, in ordinal order, with blank-line separators.
///
/// The conversation-level hash and word count are computed over this text.
#[must_use]
pub fn aggregate_text<'a, I>(contents: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    contents.into_iter().collect::<Vec<_>>().join("\n\n")
}

/// The subset of a stored record that the skip decision looks at.
#[derive(Debug, Clone, Copy)]
pub struct StoredState<'a> {
    pub content_hash: Option<&'a str>,
    pub updated_at: Option<&'a str>,
}

/// Decide whether an export can be skipped.
///
/// True iff a stored record exists AND either its hash equals `new_hash`
/// or its `updated_at` is at or after `new_updated_at`. Timestamps that are
/// missing or unparseable on either side never satisfy the second arm.
#[must_use]
pub fn should_skip(
    existing: Option<StoredState<'_>>,
    new_hash: &str,
    new_updated_at: Option<DateTime<Utc>>,
) -> bool {
    let Some(existing) = existing else {
        return false;
    };

    if existing.content_hash == Some(new_hash) {
        return true;
    }

    match (parse_opt(existing.updated_at), new_updated_at) {
        (Some(stored), Some(incoming)) => stored >= incoming,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_iso;

    #[test]
    fn test_hash_is_whitespace_and_case_insensitive() {
        assert_eq!(content_hash("Hello   World"), content_hash("  hello world  "));
        assert_eq!(content_hash("a\n\tb"), content_hash("A B"));
        assert_ne!(content_hash("hello world"), content_hash("hello worlds"));
        assert_eq!(content_hash("x").len(), 64);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n "), 0);
        assert_eq!(word_count(" one two\nthree "), 3);
    }

    #[test]
    fn test_aggregate_text() {
        assert_eq!(aggregate_text(["a", "b"]), "a\n\nb");
        assert_eq!(aggregate_text(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_should_skip_requires_existing() {
        assert!(!should_skip(None, "h", parse_iso("2024-01-01")));
    }

    #[test]
    fn test_should_skip_on_matching_hash() {
        let stored = StoredState {
            content_hash: Some("h"),
            updated_at: Some("2020-01-01T00:00:00Z"),
        };
        assert!(should_skip(Some(stored), "h", parse_iso("2024-01-01")));
    }

    #[test]
    fn test_should_skip_on_stale_incoming() {
        let stored = StoredState {
            content_hash: Some("old"),
            updated_at: Some("2024-06-01T00:00:00Z"),
        };
        assert!(should_skip(Some(stored), "new", parse_iso("2024-06-01T00:00:00Z")));
        assert!(should_skip(Some(stored), "new", parse_iso("2024-01-01")));
        assert!(!should_skip(Some(stored), "new", parse_iso("2024-07-01")));
    }

    #[test]
    fn test_should_not_skip_without_timestamps() {
        let stored = StoredState {
            content_hash: Some("old"),
            updated_at: None,
        };
        assert!(!should_skip(Some(stored), "new", parse_iso("2024-01-01")));

        let stored = StoredState {
            content_hash: Some("old"),
            updated_at: Some("2024-01-01"),
        };
        assert!(!should_skip(Some(stored), "new", None));
    }
}
