//! Named DOM probe strategies.
//!
//! Host pages change their markup without notice. Rather than silently
//! falling through a list of selectors, each selector variant is a named
//! strategy with a declared capability. Callers try the strategies that
//! support the capability they need, in priority order, and log the one
//! that worked.

/// What a strategy can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Presence means the conversation list has rendered.
    DetectContent,
    /// Matches conversation reference anchors.
    FindAnchors,
    /// Matches rendered message nodes on a conversation page.
    DetectMessages,
    /// Matches the element naming the assistant on a conversation page.
    DetectAuthor,
}

/// One selector variant with a capability contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStrategy {
    pub name: &'static str,
    pub selector: &'static str,
    pub capabilities: &'static [Capability],
}

impl ProbeStrategy {
    /// Whether this strategy declares `capability`.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Conversation-list strategies, highest priority first.
pub const LIST_STRATEGIES: &[ProbeStrategy] = &[
    ProbeStrategy {
        name: "chat-href-contains",
        selector: "a[href*='/chat/']",
        capabilities: &[Capability::DetectContent, Capability::FindAnchors],
    },
    ProbeStrategy {
        name: "chat-href-prefix",
        selector: "a[href^='/chat/']",
        capabilities: &[Capability::DetectContent, Capability::FindAnchors],
    },
    ProbeStrategy {
        name: "chat-testid-tile",
        selector: "[data-testid^='chat'] a[href]",
        capabilities: &[Capability::DetectContent, Capability::FindAnchors],
    },
    ProbeStrategy {
        name: "nav-chat-link",
        selector: "nav a[href*='/chat/']",
        capabilities: &[Capability::FindAnchors],
    },
    ProbeStrategy {
        name: "chat-list-container",
        selector: "[class*='ChatHistory'], [class*='chatHistory']",
        capabilities: &[Capability::DetectContent],
    },
];

/// Conversation-page strategies, highest priority first.
pub const MESSAGE_STRATEGIES: &[ProbeStrategy] = &[
    ProbeStrategy {
        name: "message-row",
        selector: "div[class*='Message_messageRow']",
        capabilities: &[Capability::DetectMessages],
    },
    ProbeStrategy {
        name: "message-testid",
        selector: "[data-testid*='message']",
        capabilities: &[Capability::DetectMessages],
    },
    ProbeStrategy {
        name: "chat-message-class",
        selector: ".ChatMessage",
        capabilities: &[Capability::DetectMessages],
    },
    ProbeStrategy {
        name: "message-class",
        selector: "[class*='Message']",
        capabilities: &[Capability::DetectMessages],
    },
    ProbeStrategy {
        name: "bot-header",
        selector: "[data-testid*='bot'], [class*='BotHeader'], .bot-name",
        capabilities: &[Capability::DetectAuthor],
    },
];

/// Strategies from `list` that support `capability`, in priority order.
pub fn strategies_for(
    list: &'static [ProbeStrategy],
    capability: Capability,
) -> impl Iterator<Item = &'static ProbeStrategy> {
    list.iter().filter(move |s| s.supports(capability))
}

/// Names of the strategies that support `capability`.
#[must_use]
pub fn strategy_names(list: &'static [ProbeStrategy], capability: Capability) -> Vec<String> {
    strategies_for(list, capability)
        .map(|s| s.name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategies_for_filters_by_capability() {
        let anchors = strategy_names(LIST_STRATEGIES, Capability::FindAnchors);
        assert_eq!(anchors[0], "chat-href-contains");
        assert!(anchors.contains(&"nav-chat-link".to_string()));
        assert!(!anchors.contains(&"chat-list-container".to_string()));

        let content = strategy_names(LIST_STRATEGIES, Capability::DetectContent);
        assert!(content.contains(&"chat-list-container".to_string()));
        assert!(!content.contains(&"nav-chat-link".to_string()));
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = LIST_STRATEGIES
            .iter()
            .chain(MESSAGE_STRATEGIES)
            .map(|s| s.name)
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
