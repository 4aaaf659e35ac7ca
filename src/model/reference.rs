//! Conversation references discovered on the conversation list page.

use serde::{Deserialize, Serialize};

/// A link to one conversation, as discovered by the acquisition engine.
///
/// `id` is the path segment after the chat marker (e.g. `/chat/<id>`), which
/// doubles as the conversation's `graph_id` in live mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRef {
    pub id: String,
    pub title: String,
    pub url: String,
}

impl ConversationRef {
    /// Build a reference from an absolute URL, extracting the id after `marker`.
    ///
    /// Returns `None` when the URL does not contain the marker or the id is empty.
    #[must_use]
    pub fn from_url(url: &str, marker: &str, title: String) -> Option<Self> {
        let id = conversation_id(url, marker)?;
        Some(Self {
            id,
            title,
            url: url.to_string(),
        })
    }
}

/// Extract the conversation id following `marker` (e.g. `/chat/`) in a URL.
///
/// The id ends at the first `?`, `#` or `/`.
#[must_use]
pub fn conversation_id(url: &str, marker: &str) -> Option<String> {
    let start = url.find(marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find(['?', '#', '/']).unwrap_or(rest.len());
    let id = &rest[..end];
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
