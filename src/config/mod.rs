//! Configuration management.
//!
//! Every run is driven by explicit configuration records built once at the
//! entry point and passed down: [`SyncConfig`] for the export and catalog
//! side, [`AcquisitionConfig`] for the browser side. Nothing in the core
//! reads environment variables or global state.
//!
//! Paths resolve with the same priority everywhere:
//! 1. explicit CLI flag
//! 2. environment variable (`CHATVAULT_*`)
//! 3. settings file `~/.chatvault/config.json`
//! 4. built-in default

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::acquire::retry::RetryPolicy;
use crate::error::{Error, Result};
use crate::sync::ExportOptions;

/// Default archive root, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default catalog file name, inside the archive root.
pub const DEFAULT_DB_FILE: &str = "catalog.sqlite";

/// Default chromedriver endpoint.
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

// ── Sync configuration ────────────────────────────────────────

/// How the `since` cutoff treats conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SincePolicy {
    /// Skip every conversation last updated before the cutoff.
    #[default]
    GateAll,
    /// Skip only conversations the catalog already holds; first discovery
    /// is never gated.
    KnownOnly,
}

/// Explicit record driving one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Archive root.
    pub output_dir: PathBuf,
    /// Catalog database path.
    pub db_path: PathBuf,
    /// Whether to open and write the catalog at all.
    pub build_db: bool,
    pub since: Option<DateTime<Utc>>,
    pub since_policy: SincePolicy,
    /// Rebuild the catalog from the archive without a browser.
    pub index_only: bool,
    /// Where to write failure artifacts, if anywhere.
    pub debug_dir: Option<PathBuf>,
}

impl SyncConfig {
    /// A config writing the archive and catalog under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            db_path: output_dir.join(DEFAULT_DB_FILE),
            output_dir,
            build_db: true,
            since: None,
            since_policy: SincePolicy::default(),
            index_only: false,
            debug_dir: None,
        }
    }

    /// Per-conversation export options for this run.
    #[must_use]
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            since: self.since,
            since_policy: self.since_policy,
            index_only: self.index_only,
        }
    }
}

/// Parse a `--since` value as a UTC cutoff.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the value is not ISO8601.
pub fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    crate::model::parse_iso(value)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid since timestamp: {value}")))
}

// ── Acquisition configuration ─────────────────────────────────

/// Everything site-specific about the host web application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Site root, e.g. `https://poe.com`.
    pub base_url: String,
    /// Path of the conversation listing.
    pub listing_path: String,
    /// Substring of the location that means "still on the login page".
    pub login_marker: String,
    /// Domain attribute for injected cookies.
    pub cookie_domain: String,
    /// Cookie that must be present for authentication.
    pub required_cookie: String,
    /// Cookies injected only when supplied.
    pub optional_cookies: Vec<String>,
    /// Path segment that precedes a conversation id in its URL.
    pub link_marker: String,
}

impl SiteProfile {
    /// Profile for poe.com.
    #[must_use]
    pub fn poe() -> Self {
        Self {
            base_url: "https://poe.com".to_string(),
            listing_path: "/chats".to_string(),
            login_marker: "/login".to_string(),
            cookie_domain: "poe.com".to_string(),
            required_cookie: "p-b".to_string(),
            optional_cookies: vec!["p-lat".to_string(), "formkey".to_string()],
            link_marker: "/chat/".to_string(),
        }
    }

    /// Absolute URL of the conversation listing.
    #[must_use]
    pub fn listing_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.listing_path
        )
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::poe()
    }
}

/// Bounds on the scroll-to-exhaustion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOptions {
    /// Stop once this many references are collected.
    pub limit: Option<usize>,
    pub max_scrolls: usize,
    /// Wall-clock budget for the whole loop.
    pub max_time: Duration,
    /// Sleep after each scroll step.
    pub pause: Duration,
    /// Consecutive steps without height growth before giving up.
    pub no_growth_threshold: usize,
    /// Pixels per scroll step.
    pub scroll_delta: i64,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            limit: None,
            max_scrolls: 200,
            max_time: Duration::from_secs(600),
            pause: Duration::from_millis(1500),
            no_growth_threshold: 3,
            scroll_delta: 1200,
        }
    }
}

/// Browser-side configuration for a live run.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub site: SiteProfile,
    pub webdriver_url: String,
    pub headless: bool,
    /// Bound on waiting for the listing (or a conversation page) to render.
    pub initial_timeout: Duration,
    /// Bound on every WebDriver request.
    pub page_load_timeout: Duration,
    pub scroll: ScrollOptions,
    pub retry: RetryPolicy,
    /// Injected cookie values by name.
    pub tokens: BTreeMap<String, String>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            site: SiteProfile::poe(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            initial_timeout: Duration::from_secs(20),
            page_load_timeout: Duration::from_secs(60),
            scroll: ScrollOptions::default(),
            retry: RetryPolicy::default(),
            tokens: BTreeMap::new(),
        }
    }
}

// ── Settings file ─────────────────────────────────────────────

/// Persistent user settings in `~/.chatvault/config.json`.
///
/// Every field is optional; CLI flags and environment variables win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub webdriver_url: Option<String>,
    pub tokens_path: Option<PathBuf>,
    pub site: Option<SiteProfile>,
    pub retry: Option<RetryPolicy>,
}

/// The global chatvault directory, `~/.chatvault/`.
#[must_use]
pub fn global_chatvault_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".chatvault"))
}

/// Path of the settings file.
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    global_chatvault_dir().map(|dir| dir.join("config.json"))
}

impl Settings {
    /// Load the settings file, or defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file exists but is not valid JSON.
    pub fn load() -> Result<Self> {
        match settings_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid settings in {}: {e}", path.display())))
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Resolve the archive root.
///
/// Priority: explicit flag → `CHATVAULT_OUTPUT` → settings → `./output`.
#[must_use]
pub fn resolve_output_dir(explicit: Option<&Path>, settings: &Settings) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_path("CHATVAULT_OUTPUT"))
        .or_else(|| settings.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

/// Resolve the catalog database path.
///
/// Priority: explicit flag → `CHATVAULT_DB` → settings →
/// `<output_dir>/catalog.sqlite`.
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>, settings: &Settings, output_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_path("CHATVAULT_DB"))
        .or_else(|| settings.db_path.clone())
        .unwrap_or_else(|| output_dir.join(DEFAULT_DB_FILE))
}

/// Resolve the WebDriver endpoint.
#[must_use]
pub fn resolve_webdriver_url(explicit: Option<&str>, settings: &Settings) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("CHATVAULT_WEBDRIVER").ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| settings.webdriver_url.clone())
        .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string())
}

/// Resolve the tokens file path, if one is configured anywhere.
#[must_use]
pub fn resolve_tokens_path(explicit: Option<&Path>, settings: &Settings) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_path("CHATVAULT_TOKENS"))
        .or_else(|| settings.tokens_path.clone())
}

// ── Tokens ────────────────────────────────────────────────────

/// Load cookie tokens from a JSON object file and check them against a site.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file is unreadable, is not a JSON object
/// of strings, or lacks the site's required cookie.
pub fn load_tokens(path: &Path, site: &SiteProfile) -> Result<BTreeMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read tokens file {}: {e}", path.display())))?;
    let tokens: BTreeMap<String, String> = serde_json::from_str(&text).map_err(|e| {
        Error::Config(format!("invalid tokens file {}: {e}", path.display()))
    })?;
    check_tokens(&tokens, site)?;
    Ok(tokens)
}

/// Check that the site's required cookie is present and non-empty.
///
/// # Errors
///
/// Returns [`Error::Config`] naming the missing token.
pub fn check_tokens(tokens: &BTreeMap<String, String>, site: &SiteProfile) -> Result<()> {
    match tokens.get(&site.required_cookie) {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Error::Config(format!(
            "required token '{}' missing from tokens",
            site.required_cookie
        ))),
    }
}
