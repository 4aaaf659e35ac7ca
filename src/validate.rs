//! Ingestion validation for fetched conversation records.
//!
//! Raw records are checked once at the edge so rendering and hashing never
//! see malformed input. Roles go through the same three-tier resolution as
//! every other enumerated value: exact match → synonym lookup → error with
//! suggestion.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::model::{ConversationInput, MessageInput, RawConversation, RawMessage, parse_iso};

// ── Valid value sets (O(1) lookups) ──────────────────────────

pub static VALID_ROLES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["user", "assistant", "system", "tool"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static ROLE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("human", "user"),
        ("me", "user"),
        ("you", "user"),
        ("bot", "assistant"),
        ("ai", "assistant"),
        ("model", "assistant"),
        ("agent", "assistant"),
        ("function", "tool"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a role string via exact match or synonym lookup.
///
/// Returns the canonical role, or an error with the original input
/// and an optional suggestion.
pub fn normalize_role(input: &str) -> std::result::Result<String, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    // Tier 1: exact match
    if VALID_ROLES.contains(lower.as_str()) {
        return Ok(lower);
    }

    // Tier 2: synonym lookup
    if let Some(&canonical) = ROLE_SYNONYMS.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    // Tier 3: find closest suggestion
    let suggestion = find_closest_match(&lower, &VALID_ROLES, &ROLE_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// Validate a raw conversation and its messages.
///
/// # Errors
///
/// Returns [`Error::Validation`] when a required id is missing, a timestamp
/// does not parse, a role is unknown, message ids repeat, or ordinals are
/// not strictly increasing.
pub fn validate_conversation(
    raw: RawConversation,
) -> Result<(ConversationInput, Vec<MessageInput>)> {
    let graph_id = required_id(raw.graph_id, "conversation graph_id")?;

    let conversation = ConversationInput {
        title: raw.title.map(|t| t.trim().to_string()).unwrap_or_default(),
        url: non_blank(raw.url),
        created_at: timestamp_field(raw.created_at, &graph_id, "created_at")?,
        updated_at: timestamp_field(raw.updated_at, &graph_id, "updated_at")?,
        parent_graph_id: non_blank(raw.parent_graph_id),
        page_order: raw.page_order,
        slug_hint: None,
        graph_id,
    };

    let messages = validate_messages(&conversation.graph_id, raw.messages)?;
    Ok((conversation, messages))
}

/// Validate the messages of one conversation, assigning missing ordinals.
///
/// A message without an ordinal takes the previous ordinal plus one
/// (the first defaults to 1).
///
/// # Errors
///
/// See [`validate_conversation`].
pub fn validate_messages(conversation_id: &str, raw: Vec<RawMessage>) -> Result<Vec<MessageInput>> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut previous: i64 = 0;
    let mut out = Vec::with_capacity(raw.len());

    for (idx, msg) in raw.into_iter().enumerate() {
        let graph_id = required_id(
            msg.graph_id,
            &format!("message #{} graph_id in {conversation_id}", idx + 1),
        )?;

        if !seen.insert(graph_id.clone()) {
            return Err(Error::Validation(format!(
                "duplicate message graph_id {graph_id} in {conversation_id}"
            )));
        }

        let ordinal = msg.ordinal.unwrap_or(previous + 1);
        if ordinal <= previous {
            return Err(Error::Validation(format!(
                "message {graph_id} in {conversation_id} has ordinal {ordinal}, \
                 expected greater than {previous}"
            )));
        }
        previous = ordinal;

        let role = match non_blank(msg.role) {
            Some(role) => Some(normalize_role(&role).map_err(|(input, suggestion)| {
                let hint = suggestion.map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default();
                Error::Validation(format!("message {graph_id}: unknown role '{input}'{hint}"))
            })?),
            None => None,
        };

        out.push(MessageInput {
            created_at: timestamp_field(msg.created_at, &graph_id, "created_at")?,
            updated_at: timestamp_field(msg.updated_at, &graph_id, "updated_at")?,
            title: non_blank(msg.title),
            author: non_blank(msg.author),
            role,
            content: msg.content.unwrap_or_default(),
            ordinal,
            parent_graph_id: non_blank(msg.parent_graph_id),
            graph_id,
        });
    }

    Ok(out)
}

/// Verify that already-assigned ordinals are strictly increasing.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming the first out-of-order message.
pub fn verify_ordinals(messages: &[MessageInput]) -> Result<()> {
    let mut previous = 0;
    for msg in messages {
        if msg.ordinal <= previous {
            return Err(Error::Validation(format!(
                "message {} has ordinal {}, expected greater than {previous}",
                msg.graph_id, msg.ordinal
            )));
        }
        previous = msg.ordinal;
    }
    Ok(())
}

fn required_id(value: Option<String>, what: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| Error::Validation(format!("missing {what}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn timestamp_field(value: Option<String>, owner: &str, field: &str) -> Result<Option<String>> {
    match non_blank(value) {
        None => Ok(None),
        Some(ts) if parse_iso(&ts).is_some() => Ok(Some(ts)),
        Some(ts) => Err(Error::Validation(format!(
            "{owner}: {field} '{ts}' is not an ISO8601 timestamp"
        ))),
    }
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 2 && best.is_none_or(|(_, d)| dist < d) {
            // For synonyms, show what it maps to
            best = Some((synonyms.get(v).copied().unwrap_or(v), dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find existing graph ids similar to the searched one.
///
/// Returns up to `max` suggestions with edit distance ≤ 3,
/// sorted by distance then alphabetically.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_message(id: &str, ordinal: Option<i64>) -> RawMessage {
        RawMessage {
            graph_id: Some(id.to_string()),
            content: Some(format!("content of {id}")),
            ordinal,
            ..RawMessage::default()
        }
    }

    #[test]
    fn test_normalize_role() {
        assert_eq!(normalize_role("user"), Ok("user".to_string()));
        assert_eq!(normalize_role("Human"), Ok("user".to_string()));
        assert_eq!(normalize_role("bot"), Ok("assistant".to_string()));
        let (input, suggestion) = normalize_role("asistant").unwrap_err();
        assert_eq!(input, "asistant");
        assert_eq!(suggestion.as_deref(), Some("assistant"));
        assert!(normalize_role("narrator").is_err());
    }

    #[test]
    fn test_validate_assigns_missing_ordinals() {
        let raw = RawConversation {
            graph_id: Some("chat-1".into()),
            title: Some("  Greeting  ".into()),
            messages: vec![raw_message("m1", None), raw_message("m2", Some(5)), raw_message("m3", None)],
            ..RawConversation::default()
        };
        let (conv, msgs) = validate_conversation(raw).unwrap();
        assert_eq!(conv.title, "Greeting");
        let ordinals: Vec<i64> = msgs.iter().map(|m| m.ordinal).collect();
        assert_eq!(ordinals, vec![1, 5, 6]);
    }

    #[test]
    fn test_validate_rejects_missing_id() {
        let raw = RawConversation {
            graph_id: Some("   ".into()),
            ..RawConversation::default()
        };
        let err = validate_conversation(raw).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_bad_timestamp() {
        let raw = RawConversation {
            graph_id: Some("chat-1".into()),
            updated_at: Some("last tuesday".into()),
            ..RawConversation::default()
        };
        let err = validate_conversation(raw).unwrap_err();
        assert!(err.to_string().contains("last tuesday"));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_unordered() {
        let dup = vec![raw_message("m1", None), raw_message("m1", None)];
        assert!(validate_messages("chat-1", dup).is_err());

        let unordered = vec![raw_message("m1", Some(3)), raw_message("m2", Some(2))];
        assert!(validate_messages("chat-1", unordered).is_err());
    }

    #[test]
    fn test_verify_ordinals() {
        let ok = vec![MessageInput::new("a", 1, "x"), MessageInput::new("b", 2, "y")];
        assert!(verify_ordinals(&ok).is_ok());
        let bad = vec![MessageInput::new("a", 2, "x"), MessageInput::new("b", 2, "y")];
        assert!(verify_ordinals(&bad).is_err());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_ids() {
        let ids = vec!["chat-1".to_string(), "chat-2".to_string(), "other".to_string()];
        let result = find_similar_ids("chat-3", &ids, 3);
        assert_eq!(result, vec!["chat-1".to_string(), "chat-2".to_string()]);
    }
}
