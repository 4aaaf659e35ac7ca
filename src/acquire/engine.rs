//! Authentication and scroll-to-exhaustion discovery.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::driver::{AnchorInfo, BrowserDriver, Cookie, ScrollTarget};
use super::probe::{Capability, LIST_STRATEGIES, strategies_for, strategy_names};
use super::retry::RetryPolicy;
use super::{AcquisitionError, AcquisitionResult, EngineState};
use crate::config::{ScrollOptions, SiteProfile};
use crate::model::ConversationRef;

/// Minimum scrollable extent, in pixels, for a node to count as a container.
const MIN_SCROLL_EXTENT: i64 = 50;

/// Longest title kept for a discovered reference.
const MAX_TITLE_CHARS: usize = 200;

/// Why the scroll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// The requested number of references was collected.
    Limit,
    /// The wall-clock budget ran out.
    TimeBudget,
    /// The iteration cap was reached.
    MaxScrolls,
    /// Scrollable height stopped growing.
    NoGrowth,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::TimeBudget => "time-budget",
            Self::MaxScrolls => "max-scrolls",
            Self::NoGrowth => "no-growth",
        }
    }
}

/// Result of a full discovery scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Deduplicated references in first-seen order.
    pub refs: Vec<ConversationRef>,
    pub stop_reason: StopReason,
    /// Scroll steps performed.
    pub iterations: usize,
}

/// Drives one browser session through discovery.
pub struct AcquisitionEngine<D: BrowserDriver> {
    driver: D,
    site: SiteProfile,
    retry: RetryPolicy,
    state: EngineState,
    debug_dir: Option<PathBuf>,
}

impl<D: BrowserDriver> AcquisitionEngine<D> {
    pub fn new(driver: D, site: SiteProfile, retry: RetryPolicy) -> Self {
        Self {
            driver,
            site,
            retry,
            state: EngineState::Unauthenticated,
            debug_dir: None,
        }
    }

    /// Write `screenshot.png` and `page.html` here when the engine fails.
    #[must_use]
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    pub fn set_debug_dir(&mut self, dir: PathBuf) {
        self.debug_dir = Some(dir);
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub const fn site(&self) -> &SiteProfile {
        &self.site
    }

    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The underlying driver, for fetching conversation pages after discovery.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Inject tokens and confirm the session is logged in.
    ///
    /// Navigates to the site root, adds the required cookie plus any optional
    /// cookies present, reloads, and checks the location. On success the
    /// listing page is loaded.
    ///
    /// # Errors
    ///
    /// [`AcquisitionError::Authentication`] if the location is still the
    /// login page; driver errors otherwise. Both leave the engine `Failed`.
    pub fn authenticate(&mut self, tokens: &BTreeMap<String, String>) -> AcquisitionResult<bool> {
        self.require(&[EngineState::Unauthenticated], "authenticate")?;
        let result = self.try_authenticate(tokens);
        self.guard(result)?;
        self.state = EngineState::Authenticated;
        info!(site = %self.site.base_url, "authenticated");
        Ok(true)
    }

    fn try_authenticate(&mut self, tokens: &BTreeMap<String, String>) -> AcquisitionResult<()> {
        self.driver.navigate(&self.site.base_url)?;

        let names = std::iter::once(&self.site.required_cookie).chain(&self.site.optional_cookies);
        let mut injected = 0;
        for name in names {
            let Some(value) = tokens.get(name).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let cookie = Cookie::new(name.clone(), value.clone(), Some(self.site.cookie_domain.clone()));
            self.driver.add_cookie(&cookie)?;
            injected += 1;
        }
        debug!(injected, "cookies injected");

        self.driver.refresh()?;
        let url = self.driver.current_url()?;
        if url.contains(&self.site.login_marker) {
            return Err(AcquisitionError::Authentication { url });
        }

        self.driver.navigate(&self.site.listing_url())?;
        let url = self.driver.current_url()?;
        if url.contains(&self.site.login_marker) {
            return Err(AcquisitionError::Authentication { url });
        }
        Ok(())
    }

    /// Wait until any content-detection strategy matches.
    ///
    /// Returns the name of the strategy that matched.
    ///
    /// # Errors
    ///
    /// [`AcquisitionError::Timeout`] listing every strategy tried, once
    /// `timeout` has elapsed with none matching.
    pub fn wait_for_initial_content(&mut self, timeout: Duration) -> AcquisitionResult<&'static str> {
        self.require(
            &[EngineState::Authenticated, EngineState::Scanning],
            "wait for content",
        )?;
        let result = self.poll_content(timeout);
        self.guard(result)
    }

    fn poll_content(&mut self, timeout: Duration) -> AcquisitionResult<&'static str> {
        let started = Instant::now();
        let mut matched = None;
        let driver = &mut self.driver;
        let ready = self.retry.poll_until(timeout, || {
            for strategy in strategies_for(LIST_STRATEGIES, Capability::DetectContent) {
                if driver.count_elements(strategy.selector)? > 0 {
                    matched = Some(strategy.name);
                    return Ok(true);
                }
            }
            Ok(false)
        })?;

        match matched {
            Some(name) if ready => {
                info!(strategy = name, "initial content detected");
                Ok(name)
            }
            _ => Err(AcquisitionError::Timeout {
                waited: started.elapsed(),
                strategies: strategy_names(LIST_STRATEGIES, Capability::DetectContent),
            }),
        }
    }

    /// Pick the node with the largest scrollable extent.
    ///
    /// Only nodes scrolling more than a small threshold with an overflow
    /// style that permits scrolling qualify. `None` means fall back to
    /// scrolling the window.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub fn find_scroll_container(&mut self) -> AcquisitionResult<Option<String>> {
        let candidates = self.driver.scroll_candidates()?;
        let best = candidates
            .into_iter()
            .filter(|c| c.extent() > MIN_SCROLL_EXTENT && c.overflow_scrolls())
            .max_by_key(super::driver::ScrollCandidate::extent);

        match &best {
            Some(c) => info!(locator = %c.locator, extent = c.extent(), "scroll container found"),
            None => info!("no scroll container, using window"),
        }
        Ok(best.map(|c| c.locator))
    }

    /// Collect every conversation link currently rendered.
    ///
    /// Each anchor strategy is queried; hrefs are made absolute against the
    /// site root and deduplicated within the pass, keeping the first match.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub fn harvest_visible_links(&mut self) -> AcquisitionResult<Vec<ConversationRef>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for strategy in strategies_for(LIST_STRATEGIES, Capability::FindAnchors) {
            let anchors = self.driver.query_anchors(strategy.selector)?;
            let before = out.len();
            for anchor in &anchors {
                let Some(r) = self.to_reference(anchor) else {
                    continue;
                };
                if seen.insert(r.url.clone()) {
                    out.push(r);
                }
            }
            if out.len() > before {
                debug!(strategy = strategy.name, added = out.len() - before, "anchors harvested");
            }
        }
        Ok(out)
    }

    fn to_reference(&self, anchor: &AnchorInfo) -> Option<ConversationRef> {
        let href = anchor.href.as_deref()?.trim();
        let url = normalize_href(&self.site.base_url, href)?;
        let id = crate::model::reference::conversation_id(&url, &self.site.link_marker)?;
        let title = link_title(anchor, &id);
        ConversationRef::from_url(&url, &self.site.link_marker, title)
    }

    /// Scroll once and press `End` for lists that ignore programmatic scroll.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub fn scroll_step(&mut self, target: &ScrollTarget, delta: i64) -> AcquisitionResult<()> {
        self.driver.scroll_by(target, delta)?;
        self.driver.press_end_key()?;
        Ok(())
    }

    /// Harvest, scroll and harvest again until one of the stop conditions.
    ///
    /// Stops on the first of: `limit` references, `max_time` elapsed,
    /// `max_scrolls` steps, or `no_growth_threshold` consecutive steps
    /// without the scroll height growing.
    ///
    /// # Errors
    ///
    /// Any driver error fails the engine and is returned.
    pub fn scroll_until_exhausted(&mut self, options: &ScrollOptions) -> AcquisitionResult<ScanOutcome> {
        self.require(
            &[EngineState::Authenticated, EngineState::Scanning],
            "scroll",
        )?;
        self.state = EngineState::Scanning;
        let result = self.scan(options);
        let outcome = self.guard(result)?;
        self.state = EngineState::Exhausted;
        info!(
            discovered = outcome.refs.len(),
            iterations = outcome.iterations,
            reason = outcome.stop_reason.as_str(),
            "discovery finished"
        );
        Ok(outcome)
    }

    fn scan(&mut self, options: &ScrollOptions) -> AcquisitionResult<ScanOutcome> {
        let started = Instant::now();
        let target = self
            .find_scroll_container()?
            .map_or(ScrollTarget::Window, ScrollTarget::Element);

        let mut seen = HashSet::new();
        let mut refs = Vec::new();
        let mut last_height = self.driver.scroll_height(&target)?;
        let mut stalled = 0;
        let mut iterations = 0;

        let stop_reason = loop {
            for r in self.harvest_visible_links()? {
                if seen.insert(r.id.clone()) {
                    refs.push(r);
                }
            }

            if let Some(limit) = options.limit {
                if refs.len() >= limit {
                    refs.truncate(limit);
                    break StopReason::Limit;
                }
            }
            if stalled >= options.no_growth_threshold {
                break StopReason::NoGrowth;
            }
            if started.elapsed() >= options.max_time {
                break StopReason::TimeBudget;
            }
            if iterations >= options.max_scrolls {
                break StopReason::MaxScrolls;
            }

            self.scroll_step(&target, options.scroll_delta)?;
            iterations += 1;
            if !options.pause.is_zero() {
                thread::sleep(options.pause);
            }

            let height = self.driver.scroll_height(&target)?;
            if height > last_height {
                last_height = height;
                stalled = 0;
            } else {
                stalled += 1;
            }
            debug!(iterations, height, stalled, found = refs.len(), "scroll step");
        };

        Ok(ScanOutcome {
            refs,
            stop_reason,
            iterations,
        })
    }

    fn require(&self, allowed: &[EngineState], op: &'static str) -> AcquisitionResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AcquisitionError::InvalidState {
                state: self.state,
                op,
            })
        }
    }

    /// Move to `Failed` on error, dumping debug artifacts first.
    fn guard<T>(&mut self, result: AcquisitionResult<T>) -> AcquisitionResult<T> {
        result.map_err(|e| self.fail(e))
    }

    /// Record an automation failure and hand the error back.
    ///
    /// Used for failures inside engine operations and for driver errors the
    /// caller hits while using [`Self::driver_mut`]. The engine ends up
    /// `Failed`, with debug artifacts written when a debug dir is set.
    pub fn fail(&mut self, error: AcquisitionError) -> AcquisitionError {
        warn!(error = %error, state = %self.state, "acquisition failed");
        self.state = EngineState::Failed;
        if let Some(dir) = self.debug_dir.clone() {
            dump_debug_artifacts(&mut self.driver, &dir);
        }
        error
    }
}

/// Best-effort capture of `screenshot.png` and `page.html`.
pub fn dump_debug_artifacts<D: BrowserDriver>(driver: &mut D, dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "cannot create debug dir");
        return;
    }
    match driver.screenshot_png() {
        Ok(png) => {
            if let Err(e) = std::fs::write(dir.join("screenshot.png"), png) {
                warn!(error = %e, "cannot write screenshot");
            }
        }
        Err(e) => warn!(error = %e, "screenshot failed"),
    }
    match driver.page_source() {
        Ok(html) => {
            if let Err(e) = std::fs::write(dir.join("page.html"), html) {
                warn!(error = %e, "cannot write page source");
            }
        }
        Err(e) => warn!(error = %e, "page source failed"),
    }
    info!(dir = %dir.display(), "debug artifacts written");
}

/// Resolve a possibly relative href against the site root.
fn normalize_href(base_url: &str, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with("javascript:") {
        return None;
    }
    let base = Url::parse(base_url).ok()?;
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

/// Visible text, then aria-label, then title attribute, then a placeholder.
fn link_title(anchor: &AnchorInfo, id: &str) -> String {
    let candidates = [
        Some(anchor.text.as_str()),
        anchor.aria_label.as_deref(),
        anchor.title.as_deref(),
    ];
    let picked = candidates
        .into_iter()
        .flatten()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty());
    match picked {
        Some(t) => t.chars().take(MAX_TITLE_CHARS).collect(),
        None => format!("Conversation {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::driver::{DriverError, ScrollCandidate};
    use crate::acquire::mock::MockDriver;
    use tempfile::TempDir;

    const BASE: &str = "https://example.test";

    fn site() -> SiteProfile {
        SiteProfile {
            base_url: BASE.to_string(),
            ..SiteProfile::poe()
        }
    }

    fn engine(driver: MockDriver) -> AcquisitionEngine<MockDriver> {
        AcquisitionEngine::new(driver, site(), RetryPolicy::immediate())
    }

    fn tokens(value: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("p-b".to_string(), value.to_string()),
            ("p-lat".to_string(), "lat".to_string()),
            ("formkey".to_string(), String::new()),
        ])
    }

    fn fast(max_scrolls: usize) -> ScrollOptions {
        ScrollOptions {
            max_scrolls,
            pause: Duration::ZERO,
            ..ScrollOptions::default()
        }
    }

    fn authed(driver: MockDriver) -> AcquisitionEngine<MockDriver> {
        let mut e = engine(driver);
        e.authenticate(&tokens("good")).unwrap();
        e
    }

    #[test]
    fn test_authenticate_injects_present_cookies() {
        let mut e = engine(MockDriver::new(BASE));
        assert!(e.authenticate(&tokens("good")).unwrap());
        assert_eq!(e.state(), EngineState::Authenticated);

        let driver = e.into_driver();
        let names: Vec<&str> = driver.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["p-b", "p-lat"]);
        assert_eq!(driver.cookies[0].domain.as_deref(), Some("poe.com"));
        assert_eq!(driver.url, "https://example.test/chats");
    }

    #[test]
    fn test_authenticate_rejected_token_fails() {
        let dir = TempDir::new().unwrap();
        let mut e = engine(MockDriver::new(BASE)).with_debug_dir(Some(dir.path().to_path_buf()));
        let err = e.authenticate(&tokens("stale")).unwrap_err();
        assert!(matches!(err, AcquisitionError::Authentication { ref url } if url.ends_with("/login")));
        assert_eq!(e.state(), EngineState::Failed);
        assert!(dir.path().join("screenshot.png").exists());
        assert!(dir.path().join("page.html").exists());
    }

    #[test]
    fn test_fail_from_caller_moves_engine_to_failed() {
        let dir = TempDir::new().unwrap();
        let mut e = authed(MockDriver::new(BASE).with_listing(2, 2, 0, 0));
        e.set_debug_dir(dir.path().join("debug"));

        let err = e.fail(DriverError::Script("tab crashed".into()).into());
        assert!(matches!(err, AcquisitionError::Driver(_)));
        assert_eq!(e.state(), EngineState::Failed);
        assert!(dir.path().join("debug/screenshot.png").exists());

        let again = e.wait_for_initial_content(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(again, AcquisitionError::InvalidState { .. }));
    }

    #[test]
    fn test_wait_for_initial_content_retries_then_succeeds() {
        let mut driver = MockDriver::new(BASE).with_listing(3, 3, 0, 0);
        driver.content_ready_after = 4;
        let mut e = authed(driver);
        let name = e.wait_for_initial_content(Duration::from_secs(5)).unwrap();
        assert_eq!(name, "chat-href-contains");
    }

    #[test]
    fn test_wait_for_initial_content_times_out_with_all_strategies() {
        let mut driver = MockDriver::new(BASE);
        driver.content_selectors.clear();
        let mut e = authed(driver);
        let err = e.wait_for_initial_content(Duration::from_millis(20)).unwrap_err();
        match err {
            AcquisitionError::Timeout { strategies, .. } => {
                assert_eq!(
                    strategies,
                    strategy_names(LIST_STRATEGIES, Capability::DetectContent)
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(e.state(), EngineState::Failed);
    }

    #[test]
    fn test_find_scroll_container_picks_largest_scrollable() {
        let mut driver = MockDriver::new(BASE);
        driver.candidates = vec![
            ScrollCandidate {
                locator: "#small".into(),
                scroll_height: 900,
                client_height: 800,
                overflow_y: "auto".into(),
            },
            ScrollCandidate {
                locator: "#hidden".into(),
                scroll_height: 9000,
                client_height: 800,
                overflow_y: "hidden".into(),
            },
            ScrollCandidate {
                locator: "#tiny".into(),
                scroll_height: 820,
                client_height: 800,
                overflow_y: "scroll".into(),
            },
        ];
        let mut e = engine(driver);
        assert_eq!(e.find_scroll_container().unwrap().as_deref(), Some("#small"));

        e.driver_mut().candidates.clear();
        assert_eq!(e.find_scroll_container().unwrap(), None);
    }

    #[test]
    fn test_harvest_dedupes_across_strategies() {
        let mut driver = MockDriver::new(BASE).with_listing(2, 2, 0, 0);
        driver.anchor_selectors.insert("a[href^='/chat/']".to_string());
        driver.anchors.push(AnchorInfo {
            href: Some("https://example.test/chat/c1#top".into()),
            text: String::new(),
            aria_label: None,
            title: None,
        });
        driver.initial_visible = 3;
        let mut e = authed(driver);

        let refs = e.harvest_visible_links().unwrap();
        let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(refs[0].url, "https://example.test/chat/c1");
        assert_eq!(refs[0].title, "Chat 1");
    }

    #[test]
    fn test_link_title_fallbacks() {
        let mut anchor = AnchorInfo {
            href: Some("/chat/x".into()),
            text: "  Multi\n line  title ".into(),
            aria_label: Some("Aria".into()),
            title: Some("Attr".into()),
        };
        assert_eq!(link_title(&anchor, "x"), "Multi line title");
        anchor.text.clear();
        assert_eq!(link_title(&anchor, "x"), "Aria");
        anchor.aria_label = None;
        assert_eq!(link_title(&anchor, "x"), "Attr");
        anchor.title = Some("   ".into());
        assert_eq!(link_title(&anchor, "x"), "Conversation x");

        anchor.text = "y".repeat(500);
        assert_eq!(link_title(&anchor, "x").chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_normalize_href() {
        assert_eq!(
            normalize_href(BASE, "/chat/a1").as_deref(),
            Some("https://example.test/chat/a1")
        );
        assert_eq!(
            normalize_href(BASE, "https://other.test/chat/a1#frag").as_deref(),
            Some("https://other.test/chat/a1")
        );
        assert_eq!(normalize_href(BASE, "javascript:void(0)"), None);
    }

    #[test]
    fn test_scroll_terminates_on_no_growth() {
        // Height grows for K = 4 steps, then stays flat
        let driver = MockDriver::new(BASE).with_listing(30, 5, 5, 4);
        let mut e = authed(driver);
        let options = fast(100);

        let outcome = e.scroll_until_exhausted(&options).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::NoGrowth);
        assert_eq!(outcome.iterations, 4 + options.no_growth_threshold);
        assert_eq!(outcome.refs.len(), 25);
        assert_eq!(outcome.refs[0].id, "c1");
        assert_eq!(outcome.refs[24].id, "c25");
        assert_eq!(e.state(), EngineState::Exhausted);

        let driver = e.into_driver();
        assert_eq!(driver.end_presses, outcome.iterations);
        assert!(driver.scrolled_targets.iter().all(|t| *t == ScrollTarget::Window));
    }

    #[test]
    fn test_scroll_stops_at_limit() {
        let driver = MockDriver::new(BASE).with_listing(30, 5, 5, 10);
        let mut e = authed(driver);
        let options = ScrollOptions {
            limit: Some(12),
            ..fast(100)
        };
        let outcome = e.scroll_until_exhausted(&options).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Limit);
        assert_eq!(outcome.refs.len(), 12);
        assert_eq!(outcome.iterations, 2);
    }

    #[test]
    fn test_scroll_stops_at_max_scrolls() {
        let driver = MockDriver::new(BASE).with_listing(100, 5, 5, 50);
        let mut e = authed(driver);
        let outcome = e.scroll_until_exhausted(&fast(3)).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::MaxScrolls);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.refs.len(), 20);
    }

    #[test]
    fn test_scroll_stops_on_time_budget() {
        let driver = MockDriver::new(BASE).with_listing(100, 5, 5, 50);
        let mut e = authed(driver);
        let options = ScrollOptions {
            max_time: Duration::ZERO,
            ..fast(100)
        };
        let outcome = e.scroll_until_exhausted(&options).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::TimeBudget);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.refs.len(), 5);
    }

    #[test]
    fn test_scroll_uses_detected_container() {
        let mut driver = MockDriver::new(BASE).with_listing(5, 5, 0, 0);
        driver.candidates = vec![ScrollCandidate {
            locator: "#chat-list".into(),
            scroll_height: 4000,
            client_height: 700,
            overflow_y: "auto".into(),
        }];
        let mut e = authed(driver);
        e.scroll_until_exhausted(&fast(10)).unwrap();
        let driver = e.into_driver();
        assert_eq!(
            driver.scrolled_targets[0],
            ScrollTarget::Element("#chat-list".into())
        );
    }

    #[test]
    fn test_driver_error_fails_engine() {
        let dir = TempDir::new().unwrap();
        let mut driver = MockDriver::new(BASE).with_listing(10, 5, 5, 5);
        driver.fail_scroll = true;
        let mut e = authed(driver).with_debug_dir(Some(dir.path().join("debug")));

        let err = e.scroll_until_exhausted(&fast(10)).unwrap_err();
        assert!(matches!(err, AcquisitionError::Driver(_)));
        assert_eq!(e.state(), EngineState::Failed);
        assert!(dir.path().join("debug/page.html").exists());

        let again = e.scroll_until_exhausted(&fast(10)).unwrap_err();
        assert!(matches!(again, AcquisitionError::InvalidState { .. }));
    }

    #[test]
    fn test_scroll_requires_authentication() {
        let mut e = engine(MockDriver::new(BASE));
        let err = e.scroll_until_exhausted(&fast(1)).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::InvalidState {
                state: EngineState::Unauthenticated,
                ..
            }
        ));
    }
}
