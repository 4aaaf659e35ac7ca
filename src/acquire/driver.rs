//! Browser automation seam.
//!
//! The acquisition engine only talks to a browser through [`BrowserDriver`].
//! The production implementation speaks W3C WebDriver
//! ([`super::webdriver::WebDriverSession`]); tests use a simulated DOM.
//!
//! Every DOM read returns plain data (strings and numbers) rather than live
//! element handles, so a stale element can never surface as an error in the
//! middle of a harvest pass.

use serde::{Deserialize, Serialize};

/// Errors raised by the browser automation layer.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Transport failure talking to the WebDriver endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebDriver endpoint returned a protocol error.
    #[error("{error}: {message}")]
    Protocol { error: String, message: String },

    /// The response did not have the expected shape.
    #[error("Unexpected WebDriver response: {0}")]
    UnexpectedResponse(String),

    /// A script or DOM operation failed inside the page.
    #[error("Script failed: {0}")]
    Script(String),
}

/// Result type for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A cookie to inject before authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub path: String,
}

impl Cookie {
    /// A cookie scoped to `/` on an optional domain.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: Option<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain,
            path: "/".to_string(),
        }
    }
}

/// Attributes of one anchor element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnchorInfo {
    /// Raw `href` attribute (may be relative).
    pub href: Option<String>,
    /// Visible text.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A node that may scroll, as measured by the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScrollCandidate {
    /// CSS selector that addresses exactly this node.
    pub locator: String,
    pub scroll_height: i64,
    pub client_height: i64,
    /// Computed `overflow-y` style.
    pub overflow_y: String,
}

impl ScrollCandidate {
    /// Scrollable extent in pixels.
    #[must_use]
    pub fn extent(&self) -> i64 {
        self.scroll_height - self.client_height
    }

    /// Whether the computed overflow style lets the node scroll.
    #[must_use]
    pub fn overflow_scrolls(&self) -> bool {
        matches!(self.overflow_y.as_str(), "auto" | "scroll" | "overlay")
    }
}

/// What to scroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTarget {
    /// The document itself.
    Window,
    /// A specific container, by locator.
    Element(String),
}

/// One rendered message node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageNode {
    /// `data-message-id` attribute, when present.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Class names and `data-testid` values of the node and its parent,
    /// space-separated.
    #[serde(default)]
    pub class_name: String,
    /// Visible text.
    #[serde(default)]
    pub text: String,
    /// `datetime` of a `<time>` descendant.
    #[serde(default)]
    pub datetime: Option<String>,
}

/// Blocking browser automation.
///
/// Methods take `&mut self`: a session is a single-owner resource driven by
/// one thread.
pub trait BrowserDriver {
    /// Load a URL and wait for the document to be ready.
    fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// The current location.
    fn current_url(&mut self) -> DriverResult<String>;

    /// Add a cookie for the current document's domain.
    fn add_cookie(&mut self, cookie: &Cookie) -> DriverResult<()>;

    /// Reload the current document.
    fn refresh(&mut self) -> DriverResult<()>;

    /// Anchors matching a CSS selector, in document order.
    fn query_anchors(&mut self, selector: &str) -> DriverResult<Vec<AnchorInfo>>;

    /// Number of elements matching a CSS selector.
    fn count_elements(&mut self, selector: &str) -> DriverResult<usize>;

    /// Visible text of elements matching a CSS selector.
    fn element_texts(&mut self, selector: &str) -> DriverResult<Vec<String>>;

    /// Every node whose scroll height exceeds its client height.
    fn scroll_candidates(&mut self) -> DriverResult<Vec<ScrollCandidate>>;

    /// Scroll a target by `dy` pixels.
    fn scroll_by(&mut self, target: &ScrollTarget, dy: i64) -> DriverResult<()>;

    /// Scroll a target back to the top.
    fn scroll_to_top(&mut self, target: &ScrollTarget) -> DriverResult<()>;

    /// Current scroll height of a target.
    fn scroll_height(&mut self, target: &ScrollTarget) -> DriverResult<i64>;

    /// Dispatch an `End` key press to the focused document.
    fn press_end_key(&mut self) -> DriverResult<()>;

    /// Message nodes matching a CSS selector, in document order.
    fn query_message_nodes(&mut self, selector: &str) -> DriverResult<Vec<MessageNode>>;

    /// PNG screenshot of the viewport.
    fn screenshot_png(&mut self) -> DriverResult<Vec<u8>>;

    /// Full page markup.
    fn page_source(&mut self) -> DriverResult<String>;
}
