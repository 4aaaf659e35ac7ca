//! W3C WebDriver client over blocking HTTP.
//!
//! Speaks directly to a chromedriver (or any W3C-compliant) endpoint. DOM
//! reads are single `execute/sync` scripts that return plain JSON, so no
//! element references ever cross the wire.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::driver::{
    AnchorInfo, BrowserDriver, Cookie, DriverError, DriverResult, MessageNode, ScrollCandidate,
    ScrollTarget,
};

/// W3C key code for `End`.
const END_KEY: &str = "\u{E010}";

const ANCHORS_JS: &str = r"
return Array.from(document.querySelectorAll(arguments[0])).map(a => ({
  href: a.getAttribute('href'),
  text: (a.innerText || '').trim(),
  aria_label: a.getAttribute('aria-label'),
  title: a.getAttribute('title')
}));";

const COUNT_JS: &str = "return document.querySelectorAll(arguments[0]).length;";

const TEXTS_JS: &str =
    "return Array.from(document.querySelectorAll(arguments[0])).map(e => (e.innerText || '').trim());";

const CANDIDATES_JS: &str = r#"
const out = [];
let n = 0;
for (const el of document.querySelectorAll('*')) {
  if (el.scrollHeight <= el.clientHeight) continue;
  let locator;
  if (el.id) {
    locator = '#' + CSS.escape(el.id);
  } else {
    el.setAttribute('data-cv-scroll', String(n));
    locator = '[data-cv-scroll="' + n + '"]';
    n += 1;
  }
  out.push({
    locator: locator,
    scroll_height: el.scrollHeight,
    client_height: el.clientHeight,
    overflow_y: getComputedStyle(el).overflowY
  });
}
return out;"#;

const MESSAGES_JS: &str = r"
return Array.from(document.querySelectorAll(arguments[0])).map(el => {
  const p = el.parentElement;
  const t = el.querySelector('time[datetime]');
  const marks = [el.className, el.getAttribute('data-testid'),
                 p && p.className, p && p.getAttribute('data-testid')];
  return {
    message_id: el.getAttribute('data-message-id'),
    class_name: marks.filter(x => typeof x === 'string' && x).join(' '),
    text: (el.innerText || '').trim(),
    datetime: t ? t.getAttribute('datetime') : null
  };
});";

/// Enough to delete a session from another thread (the interrupt handler).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    client: Client,
    session_url: String,
}

impl SessionHandle {
    /// Delete the remote session, ignoring failures.
    pub fn delete(&self) {
        if let Err(e) = self.client.delete(&self.session_url).send() {
            warn!(error = %e, "failed to delete WebDriver session");
        }
    }
}

/// One live browser session.
///
/// The remote session is deleted on [`WebDriverSession::quit`] or on drop,
/// whichever comes first.
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    session_id: Option<String>,
}

impl WebDriverSession {
    /// Start a Chrome session.
    ///
    /// `timeout` bounds page loads, scripts and each HTTP request.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or refuses the session.
    pub fn start(endpoint: &str, headless: bool, timeout: Duration) -> DriverResult<Self> {
        let client = Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()?;

        let mut args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--window-size=1920,1080",
        ];
        if headless {
            args.push("--headless=new");
        }
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                    "timeouts": { "pageLoad": timeout_ms, "script": timeout_ms }
                }
            }
        });

        let mut session = Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session_id: None,
        };
        let value = session.send(Method::POST, "/session", Some(capabilities))?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::UnexpectedResponse(format!("no sessionId in {value}")))?;
        session.session_id = Some(id.to_string());
        info!(endpoint = %session.endpoint, session = id, headless, "browser session started");
        Ok(session)
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// A handle that can delete this session from elsewhere.
    #[must_use]
    pub fn handle(&self) -> Option<SessionHandle> {
        let id = self.session_id.as_ref()?;
        Some(SessionHandle {
            client: self.client.clone(),
            session_url: format!("{}/session/{id}", self.endpoint),
        })
    }

    /// Delete the remote session. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint rejects the delete.
    pub fn quit(&mut self) -> DriverResult<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        self.send(Method::DELETE, &format!("/session/{id}"), None)?;
        info!(session = %id, "browser session closed");
        Ok(())
    }

    fn session_path(&self, suffix: &str) -> DriverResult<String> {
        let id = self
            .session_id
            .as_ref()
            .ok_or_else(|| DriverError::UnexpectedResponse("session already closed".into()))?;
        Ok(format!("/session/{id}{suffix}"))
    }

    fn send(&self, method: Method, path: &str, body: Option<Value>) -> DriverResult<Value> {
        let url = format!("{}{path}", self.endpoint);
        debug!(%method, %url, "webdriver request");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send()?;
        let status = response.status();
        let mut body: Value = response.json()?;
        let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(DriverError::Protocol {
                error: error.to_string(),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        if !status.is_success() {
            return Err(DriverError::UnexpectedResponse(format!("HTTP {status}: {value}")));
        }
        Ok(value)
    }

    fn command(&self, method: Method, suffix: &str, body: Option<Value>) -> DriverResult<Value> {
        let path = self.session_path(suffix)?;
        self.send(method, &path, body)
    }

    fn execute<T: DeserializeOwned>(&self, script: &str, args: Value) -> DriverResult<T> {
        let value = self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )?;
        serde_json::from_value(value).map_err(|e| DriverError::Script(e.to_string()))
    }

    fn string_value(&self, suffix: &str) -> DriverResult<String> {
        match self.command(Method::GET, suffix, None)? {
            Value::String(s) => Ok(s),
            other => Err(DriverError::UnexpectedResponse(format!(
                "expected string from {suffix}, got {other}"
            ))),
        }
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if let Err(e) = self.quit() {
            warn!(error = %e, "failed to close browser session");
        }
    }
}

impl BrowserDriver for WebDriverSession {
    fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn current_url(&mut self) -> DriverResult<String> {
        self.string_value("/url")
    }

    fn add_cookie(&mut self, cookie: &Cookie) -> DriverResult<()> {
        self.command(Method::POST, "/cookie", Some(json!({ "cookie": cookie })))?;
        Ok(())
    }

    fn refresh(&mut self) -> DriverResult<()> {
        self.command(Method::POST, "/refresh", Some(json!({})))?;
        Ok(())
    }

    fn query_anchors(&mut self, selector: &str) -> DriverResult<Vec<AnchorInfo>> {
        self.execute(ANCHORS_JS, json!([selector]))
    }

    fn count_elements(&mut self, selector: &str) -> DriverResult<usize> {
        self.execute(COUNT_JS, json!([selector]))
    }

    fn element_texts(&mut self, selector: &str) -> DriverResult<Vec<String>> {
        self.execute(TEXTS_JS, json!([selector]))
    }

    fn scroll_candidates(&mut self) -> DriverResult<Vec<ScrollCandidate>> {
        self.execute(CANDIDATES_JS, json!([]))
    }

    fn scroll_by(&mut self, target: &ScrollTarget, dy: i64) -> DriverResult<()> {
        match target {
            ScrollTarget::Window => {
                self.execute::<Value>("window.scrollBy(0, arguments[0]);", json!([dy]))?;
            }
            ScrollTarget::Element(locator) => {
                self.execute::<Value>(
                    "const el = document.querySelector(arguments[0]); \
                     if (el) { el.scrollTop = el.scrollTop + arguments[1]; }",
                    json!([locator, dy]),
                )?;
            }
        }
        Ok(())
    }

    fn scroll_to_top(&mut self, target: &ScrollTarget) -> DriverResult<()> {
        match target {
            ScrollTarget::Window => {
                self.execute::<Value>("window.scrollTo(0, 0);", json!([]))?;
            }
            ScrollTarget::Element(locator) => {
                self.execute::<Value>(
                    "const el = document.querySelector(arguments[0]); if (el) { el.scrollTop = 0; }",
                    json!([locator]),
                )?;
            }
        }
        Ok(())
    }

    fn scroll_height(&mut self, target: &ScrollTarget) -> DriverResult<i64> {
        match target {
            ScrollTarget::Window => self.execute("return document.body.scrollHeight;", json!([])),
            ScrollTarget::Element(locator) => self.execute(
                "const el = document.querySelector(arguments[0]); return el ? el.scrollHeight : 0;",
                json!([locator]),
            ),
        }
    }

    fn press_end_key(&mut self) -> DriverResult<()> {
        let actions = json!({
            "actions": [{
                "type": "key",
                "id": "keyboard",
                "actions": [
                    { "type": "keyDown", "value": END_KEY },
                    { "type": "keyUp", "value": END_KEY }
                ]
            }]
        });
        self.command(Method::POST, "/actions", Some(actions))?;
        Ok(())
    }

    fn query_message_nodes(&mut self, selector: &str) -> DriverResult<Vec<MessageNode>> {
        self.execute(MESSAGES_JS, json!([selector]))
    }

    fn screenshot_png(&mut self) -> DriverResult<Vec<u8>> {
        let encoded = self.string_value("/screenshot")?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| DriverError::UnexpectedResponse(format!("bad screenshot encoding: {e}")))
    }

    fn page_source(&mut self) -> DriverResult<String> {
        self.string_value("/source")
    }
}

/// Delete `session` and exit with status 130 on Ctrl-C.
///
/// # Errors
///
/// Returns an error if a handler is already installed.
pub fn install_interrupt_handler(session: &WebDriverSession) -> Result<(), ctrlc::Error> {
    let handle = session.handle();
    ctrlc::set_handler(move || {
        warn!("interrupted, closing browser session");
        if let Some(handle) = &handle {
            handle.delete();
        }
        std::process::exit(130);
    })
}
