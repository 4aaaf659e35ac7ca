//! Simulated DOM for exercising the acquisition layer without a browser.
//!
//! The listing grows by `per_step` anchors and `growth_per_step` pixels on
//! each scroll step, for the first `grow_steps` steps only. After that the
//! page is exhausted and further scrolling changes nothing.

use std::collections::{BTreeMap, BTreeSet};

use super::driver::{
    AnchorInfo, BrowserDriver, Cookie, DriverError, DriverResult, MessageNode, ScrollCandidate,
    ScrollTarget,
};

#[derive(Debug, Clone)]
pub struct MockDriver {
    pub base_url: String,
    pub url: String,
    pub required_cookie: (String, String),
    pub cookies: Vec<Cookie>,
    pub authenticated: bool,

    /// Every anchor the listing can ever show, in document order.
    pub anchors: Vec<AnchorInfo>,
    /// Selectors that match listing anchors.
    pub anchor_selectors: BTreeSet<String>,
    /// Selectors that count as "content present" once `content_ready_after`
    /// polls have happened.
    pub content_selectors: BTreeSet<String>,
    pub content_ready_after: usize,
    pub content_polls: usize,

    pub initial_visible: usize,
    pub per_step: usize,
    pub base_height: i64,
    pub growth_per_step: i64,
    pub grow_steps: usize,
    pub steps: usize,
    pub end_presses: usize,
    pub candidates: Vec<ScrollCandidate>,
    pub scrolled_targets: Vec<ScrollTarget>,

    /// Message nodes per conversation URL.
    pub messages: BTreeMap<String, Vec<MessageNode>>,
    pub message_selectors: BTreeSet<String>,
    /// Text returned for author-detection selectors.
    pub author_texts: BTreeMap<String, Vec<String>>,
    pub top_scrolls: usize,

    /// Make every scroll step fail with a script error.
    pub fail_scroll: bool,
    pub screenshots: usize,
}

impl MockDriver {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            url: "about:blank".to_string(),
            required_cookie: ("p-b".to_string(), "good".to_string()),
            cookies: Vec::new(),
            authenticated: false,
            anchors: Vec::new(),
            anchor_selectors: BTreeSet::from(["a[href*='/chat/']".to_string()]),
            content_selectors: BTreeSet::from(["a[href*='/chat/']".to_string()]),
            content_ready_after: 0,
            content_polls: 0,
            initial_visible: 0,
            per_step: 0,
            base_height: 1000,
            growth_per_step: 0,
            grow_steps: 0,
            steps: 0,
            end_presses: 0,
            candidates: Vec::new(),
            scrolled_targets: Vec::new(),
            messages: BTreeMap::new(),
            message_selectors: BTreeSet::from(["div[class*='Message_messageRow']".to_string()]),
            author_texts: BTreeMap::new(),
            top_scrolls: 0,
            fail_scroll: false,
            screenshots: 0,
        }
    }

    /// A listing of `total` chats showing `initial` at first and `per_step`
    /// more on each of the first `grow_steps` scroll steps.
    pub fn with_listing(mut self, total: usize, initial: usize, per_step: usize, grow_steps: usize) -> Self {
        self.anchors = (1..=total)
            .map(|i| AnchorInfo {
                href: Some(format!("/chat/c{i}")),
                text: format!("Chat {i}"),
                aria_label: None,
                title: None,
            })
            .collect();
        self.initial_visible = initial;
        self.per_step = per_step;
        self.growth_per_step = 500;
        self.grow_steps = grow_steps;
        self
    }

    /// Put the driver straight into an authenticated session.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    fn visible_anchors(&self) -> usize {
        let grown = self.steps.min(self.grow_steps);
        (self.initial_visible + self.per_step * grown).min(self.anchors.len())
    }

    fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }
}

impl BrowserDriver for MockDriver {
    fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.steps = 0;
        self.url = if self.authenticated || url == self.base_url {
            url.to_string()
        } else {
            self.login_url()
        };
        Ok(())
    }

    fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.url.clone())
    }

    fn add_cookie(&mut self, cookie: &Cookie) -> DriverResult<()> {
        self.cookies.push(cookie.clone());
        Ok(())
    }

    fn refresh(&mut self) -> DriverResult<()> {
        let (name, value) = &self.required_cookie;
        self.authenticated = self
            .cookies
            .iter()
            .any(|c| &c.name == name && &c.value == value);
        if !self.authenticated {
            self.url = self.login_url();
        }
        Ok(())
    }

    fn query_anchors(&mut self, selector: &str) -> DriverResult<Vec<AnchorInfo>> {
        if !self.anchor_selectors.contains(selector) {
            return Ok(Vec::new());
        }
        Ok(self.anchors[..self.visible_anchors()].to_vec())
    }

    fn count_elements(&mut self, selector: &str) -> DriverResult<usize> {
        if self.content_selectors.contains(selector) {
            self.content_polls += 1;
            if self.content_polls > self.content_ready_after {
                return Ok(self.visible_anchors().max(1));
            }
            return Ok(0);
        }
        if self.message_selectors.contains(selector) {
            return Ok(self.messages.get(&self.url).map_or(0, Vec::len));
        }
        Ok(0)
    }

    fn element_texts(&mut self, selector: &str) -> DriverResult<Vec<String>> {
        Ok(self.author_texts.get(selector).cloned().unwrap_or_default())
    }

    fn scroll_candidates(&mut self) -> DriverResult<Vec<ScrollCandidate>> {
        Ok(self.candidates.clone())
    }

    fn scroll_by(&mut self, target: &ScrollTarget, _dy: i64) -> DriverResult<()> {
        if self.fail_scroll {
            return Err(DriverError::Script("scroll rejected".into()));
        }
        self.steps += 1;
        self.scrolled_targets.push(target.clone());
        Ok(())
    }

    fn scroll_to_top(&mut self, _target: &ScrollTarget) -> DriverResult<()> {
        self.top_scrolls += 1;
        Ok(())
    }

    fn scroll_height(&mut self, _target: &ScrollTarget) -> DriverResult<i64> {
        let grown = i64::try_from(self.steps.min(self.grow_steps)).unwrap_or(i64::MAX);
        Ok(self.base_height + self.growth_per_step * grown)
    }

    fn press_end_key(&mut self) -> DriverResult<()> {
        self.end_presses += 1;
        Ok(())
    }

    fn query_message_nodes(&mut self, selector: &str) -> DriverResult<Vec<MessageNode>> {
        if !self.message_selectors.contains(selector) {
            return Ok(Vec::new());
        }
        Ok(self.messages.get(&self.url).cloned().unwrap_or_default())
    }

    fn screenshot_png(&mut self) -> DriverResult<Vec<u8>> {
        self.screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn page_source(&mut self) -> DriverResult<String> {
        Ok(format!("<html><!-- {} --></html>", self.url))
    }
}
