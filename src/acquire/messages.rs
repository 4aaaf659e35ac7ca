//! Fetching the messages of one discovered conversation.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::driver::{BrowserDriver, MessageNode, ScrollTarget};
use super::probe::{Capability, MESSAGE_STRATEGIES, ProbeStrategy, strategies_for};
use super::retry::RetryPolicy;
use super::{AcquisitionError, AcquisitionResult};
use crate::model::{ConversationRef, RawConversation, RawMessage};

/// Nodes with less visible text than this are chrome, not messages.
const MIN_MESSAGE_CHARS: usize = 3;

/// Detected author names at or above this length are page titles, not bots.
const MAX_AUTHOR_CHARS: usize = 50;

/// Turns a discovered reference into a raw conversation record.
pub trait MessageSource<D> {
    /// Fetch one conversation. `position` is its 0-based place in the
    /// discovered list.
    ///
    /// # Errors
    ///
    /// [`AcquisitionError::NoMessages`] when the page holds no messages;
    /// driver errors otherwise.
    fn fetch(
        &mut self,
        driver: &mut D,
        reference: &ConversationRef,
        position: usize,
    ) -> AcquisitionResult<RawConversation>;
}

/// Reads messages from a rendered conversation page.
#[derive(Debug, Clone)]
pub struct BrowserMessageSource {
    retry: RetryPolicy,
    /// Bound on waiting for the first message node.
    timeout: Duration,
    /// Bound on scroll-to-top passes while older messages load.
    max_top_scrolls: usize,
    pause: Duration,
}

impl BrowserMessageSource {
    #[must_use]
    pub fn new(retry: RetryPolicy, timeout: Duration, pause: Duration) -> Self {
        Self {
            retry,
            timeout,
            max_top_scrolls: 10,
            pause,
        }
    }

    fn wait_for_messages<D: BrowserDriver>(
        &self,
        driver: &mut D,
    ) -> AcquisitionResult<Option<&'static ProbeStrategy>> {
        let mut matched = None;
        self.retry.poll_until(self.timeout, || {
            for strategy in strategies_for(MESSAGE_STRATEGIES, Capability::DetectMessages) {
                if driver.count_elements(strategy.selector)? > 0 {
                    matched = Some(strategy);
                    return Ok(true);
                }
            }
            Ok(false)
        })?;
        Ok(matched)
    }

    /// Scroll to the top until the document height settles.
    fn load_history<D: BrowserDriver>(&self, driver: &mut D) -> AcquisitionResult<()> {
        let target = ScrollTarget::Window;
        let mut last = driver.scroll_height(&target)?;
        for _ in 0..self.max_top_scrolls {
            driver.scroll_to_top(&target)?;
            if !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
            let height = driver.scroll_height(&target)?;
            if height == last {
                break;
            }
            last = height;
        }
        Ok(())
    }
}

impl<D: BrowserDriver> MessageSource<D> for BrowserMessageSource {
    fn fetch(
        &mut self,
        driver: &mut D,
        reference: &ConversationRef,
        position: usize,
    ) -> AcquisitionResult<RawConversation> {
        driver.navigate(&reference.url)?;

        let Some(strategy) = self.wait_for_messages(driver)? else {
            return Err(AcquisitionError::NoMessages {
                graph_id: reference.id.clone(),
            });
        };
        debug!(graph_id = %reference.id, strategy = strategy.name, "messages detected");

        self.load_history(driver)?;
        let nodes = driver.query_message_nodes(strategy.selector)?;
        let bot = detect_author(driver)?;
        let messages = nodes_to_messages(&reference.id, &nodes, bot.as_deref());
        if messages.is_empty() {
            return Err(AcquisitionError::NoMessages {
                graph_id: reference.id.clone(),
            });
        }
        info!(graph_id = %reference.id, messages = messages.len(), "conversation fetched");

        Ok(RawConversation {
            graph_id: Some(reference.id.clone()),
            title: Some(reference.title.clone()),
            url: Some(reference.url.clone()),
            created_at: messages.iter().find_map(|m| m.created_at.clone()),
            updated_at: messages.iter().rev().find_map(|m| m.updated_at.clone()),
            parent_graph_id: None,
            page_order: i64::try_from(position).ok(),
            messages,
        })
    }
}

/// First short heading-like text naming the assistant.
fn detect_author<D: BrowserDriver>(driver: &mut D) -> AcquisitionResult<Option<String>> {
    for strategy in strategies_for(MESSAGE_STRATEGIES, Capability::DetectAuthor) {
        let found = driver
            .element_texts(strategy.selector)?
            .into_iter()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty() && t.chars().count() < MAX_AUTHOR_CHARS);
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn infer_role(node: &MessageNode) -> &'static str {
    let marker = node.class_name.to_lowercase();
    if marker.contains("user") || marker.contains("human") {
        "user"
    } else {
        "assistant"
    }
}

fn nodes_to_messages(conversation_id: &str, nodes: &[MessageNode], bot: Option<&str>) -> Vec<RawMessage> {
    let mut out = Vec::new();
    for node in nodes {
        let text = node.text.trim();
        if text.chars().count() < MIN_MESSAGE_CHARS {
            continue;
        }
        let ordinal = i64::try_from(out.len() + 1).unwrap_or(i64::MAX);
        let role = infer_role(node);
        let graph_id = node
            .message_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{conversation_id}-m{ordinal}"));
        let datetime = node.datetime.clone().filter(|d| !d.trim().is_empty());

        out.push(RawMessage {
            graph_id: Some(graph_id),
            title: None,
            author: if role == "assistant" {
                bot.map(str::to_string)
            } else {
                None
            },
            role: Some(role.to_string()),
            content: Some(text.to_string()),
            created_at: datetime.clone(),
            updated_at: datetime,
            ordinal: Some(ordinal),
            parent_graph_id: None,
        });
    }
    out
}
