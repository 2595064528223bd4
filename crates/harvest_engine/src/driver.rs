//! Browser-automation seam.
//!
//! The engine only talks to the browser through [`PageDriver`] and the
//! [`ElementHandle`]s it hands out. Implementations live outside this crate
//! (the CLI ships a Chrome DevTools one); tests use an in-memory DOM.

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::{DriverError, DriverErrorKind};

/// Granularity of the default polling waits.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Target condition for [`PageDriver::wait_for_selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitState {
    /// At least one matching element is in the DOM; the first one is returned.
    #[default]
    Attached,
    /// No matching element is in the DOM; resolves to `None`.
    Hidden,
}

#[async_trait::async_trait]
pub trait ElementHandle: Send + Sync + Sized {
    async fn query_selector(&self, selector: &str) -> Result<Option<Self>, DriverError>;
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, DriverError>;
    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
    async fn text_content(&self) -> Result<Option<String>, DriverError>;
    async fn inner_html(&self) -> Result<Option<String>, DriverError>;
    async fn click(&self) -> Result<(), DriverError>;
}

#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    type Element: ElementHandle;

    async fn goto(&self, url: &str) -> Result<(), DriverError>;
    async fn current_url(&self) -> Result<Option<String>, DriverError>;
    async fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>, DriverError>;
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element>, DriverError>;
    /// Types into whatever element currently has keyboard focus.
    async fn type_text(&self, text: &str) -> Result<(), DriverError>;
    async fn press_key(&self, key: &str) -> Result<(), DriverError>;
    async fn evaluate(&self, script: &str) -> Result<Value, DriverError>;
    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), DriverError>;
    async fn mouse_wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), DriverError>;
    async fn persist_session_state(&self, path: &Path) -> Result<(), DriverError>;
    async fn restore_session_state(&self, path: &Path) -> Result<(), DriverError>;
    async fn close(&self) -> Result<(), DriverError>;

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Polls until `selector` reaches `state`; a `Timeout` error once `timeout` elapses.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        state: WaitState,
    ) -> Result<Option<Self::Element>, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = self.query_selector(selector).await?;
            match (state, found) {
                (WaitState::Attached, Some(element)) => return Ok(Some(element)),
                (WaitState::Hidden, None) => return Ok(None),
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::new(
                    DriverErrorKind::Timeout,
                    format!("selector {selector} ({state:?}) after {timeout:?}"),
                ));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Polls the page URL until it matches `pattern`.
    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(url) = self.current_url().await? {
                if pattern.matches(&url) {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::new(
                    DriverErrorKind::Timeout,
                    format!("url {} after {timeout:?}", pattern.as_str()),
                ));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// Glob URL pattern: `**` matches anything, `*` anything but `/`, `?` one non-`/` char.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    glob: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn glob(glob: &str) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(glob.len() * 2 + 2);
        source.push('^');
        let mut chars = glob.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    source.push_str(".*");
                }
                '*' => source.push_str("[^/]*"),
                '?' => source.push_str("[^/]"),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        source.push('$');
        Ok(Self {
            glob: glob.to_string(),
            regex: Regex::new(&source)?,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}
