//! In-memory stand-in for the search page: the DOM is re-rendered from
//! [`FakeState`] on every call, so clicks, scrolling and logins are visible
//! to the next query just like in a live browser.
#![allow(dead_code)]

use std::collections::HashSet;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use harvest_engine::{
    DriverError, DriverErrorKind, ElementHandle, EngineConfig, ExportTarget, HarvestEvent,
    PageDriver, ProgressSink,
};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub const WORKSPACE_URL: &str = "https://app.example.com/client";
pub const CLIENT_URL: &str = "https://app.example.com/client/T0001/C0001";
pub const SIGNIN_URL: &str = "https://app.example.com/signin";
pub const SESSION_BLOB: &str = "fake-session-cookies";
pub const VIEWPORT: (f64, f64) = (1000.0, 700.0);

#[derive(Debug, Clone, Default)]
pub struct FakeMessage {
    pub ts: String,
    pub sender: Option<String>,
    pub blocks: Vec<String>,
    pub channel: Option<String>,
    pub href: Option<String>,
    /// Blocks shown once the "show more" control was clicked.
    pub expanded_blocks: Option<Vec<String>>,
    pub no_payload: bool,
    pub no_timestamp: bool,
}

impl FakeMessage {
    pub fn new(ts: &str, sender: &str, html: &str) -> Self {
        Self {
            ts: ts.to_string(),
            sender: Some(sender.to_string()),
            blocks: vec![html.to_string()],
            ..Self::default()
        }
    }

    pub fn in_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    pub fn with_href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn with_blocks(mut self, blocks: &[&str]) -> Self {
        self.blocks = blocks.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn truncated(mut self, full_html: &str) -> Self {
        self.expanded_blocks = Some(vec![full_html.to_string()]);
        self
    }

    pub fn without_sender(mut self) -> Self {
        self.sender = None;
        self
    }

    pub fn without_payload(mut self) -> Self {
        self.no_payload = true;
        self
    }

    pub fn without_timestamp(mut self) -> Self {
        self.no_timestamp = true;
        self
    }
}

/// Raw `data-ts` value for the `n`th numbered message.
pub fn ts(n: usize) -> String {
    format!("{}.000100", 1_690_000_000 + n)
}

/// Numbered messages `first..first + count` in `#general`, sent by `user{n}`.
pub fn numbered(count: usize, first: usize) -> Vec<FakeMessage> {
    (first..first + count)
        .map(|n| {
            FakeMessage::new(
                &ts(n),
                &format!("user{n}"),
                &format!("message {n}"),
            )
            .in_channel("general")
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub url: Option<String>,
    pub logged_in: bool,
    /// `current_url` calls before a pending interactive login completes.
    pub login_after_polls: Option<u32>,
    pub url_polls: u32,
    pub search_focused: bool,
    pub typed: String,
    pub submitted_query: Option<String>,
    pub result_count: Option<String>,
    pub pages: Vec<Vec<FakeMessage>>,
    /// 1-based.
    pub current_page: usize,
    pub visited_pages: Vec<usize>,
    pub disabled_pages: HashSet<usize>,
    pub aria_disabled_pages: HashSet<usize>,
    /// Number of message groups rendered at once.
    pub window: usize,
    pub offset: usize,
    pub expanded: HashSet<String>,
    pub wheel_count: u32,
    pub disconnect_after_wheels: Option<u32>,
    pub disconnected: bool,
    pub mouse_moves: Vec<(f64, f64)>,
    pub sort_clicked: Option<String>,
    pub restored_from: Option<PathBuf>,
    pub persisted_to: Option<PathBuf>,
    pub closed: bool,
}

impl FakeState {
    fn check(&self) -> Result<(), DriverError> {
        if self.disconnected {
            return Err(DriverError::new(DriverErrorKind::Disconnected, "target closed"));
        }
        Ok(())
    }

    fn visible(&self) -> &[FakeMessage] {
        let Some(messages) = self.current_page.checked_sub(1).and_then(|i| self.pages.get(i)) else {
            return &[];
        };
        let start = self.offset.min(self.max_offset());
        let end = (start + self.window).min(messages.len());
        &messages[start..end]
    }

    fn max_offset(&self) -> usize {
        let len = self
            .current_page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map_or(0, Vec::len);
        len.saturating_sub(self.window)
    }

    pub fn render(&self) -> String {
        let mut html = String::from("<html><body>");
        if self.url.is_none() {
            html.push_str("</body></html>");
            return html;
        }
        if !self.logged_in {
            html.push_str(r#"<form class="signin"><input name="email"></form></body></html>"#);
            return html;
        }
        html.push_str(r#"<button data-qa="top_nav_search" data-fake="search-entry">Search</button>"#);
        if self.submitted_query.is_some() {
            if let Some(count) = &self.result_count {
                html.push_str(&format!(r#"<span data-qa="search_result_count">{count}</span>"#));
            }
            html.push_str(r#"<button data-qa="search_sort_button">Sort</button>"#);
            for key in ["score", "timestamp_desc", "timestamp_asc"] {
                html.push_str(&format!(
                    r#"<button data-qa="search_sort_{key}" data-fake="sort:{key}">{key}</button>"#
                ));
            }
            html.push_str(r#"<div class="results">"#);
            let first = self.offset.min(self.max_offset());
            for (i, message) in self.visible().iter().enumerate() {
                let id = format!("p{}-m{}", self.current_page, first + i);
                html.push_str(&self.render_message(message, &id));
            }
            html.push_str("</div><nav>");
            for page in 1..=self.pages.len() {
                let mut attrs = String::new();
                if self.disabled_pages.contains(&page) {
                    attrs.push_str(" disabled");
                }
                if self.aria_disabled_pages.contains(&page) {
                    attrs.push_str(r#" aria-disabled="true""#);
                }
                html.push_str(&format!(
                    r#"<button data-qa="c-pagination_page_btn_{page}" data-fake="page:{page}"{attrs}>{page}</button>"#
                ));
            }
            html.push_str("</nav>");
        }
        html.push_str("</body></html>");
        html
    }

    fn render_message(&self, message: &FakeMessage, id: &str) -> String {
        let expanded = self.expanded.contains(&message.ts);
        let blocks = match (&message.expanded_blocks, expanded) {
            (Some(full), true) => full,
            _ => &message.blocks,
        };
        let stamp = if message.no_timestamp {
            String::new()
        } else {
            let href = message
                .href
                .as_ref()
                .map(|h| format!(r#" href="{h}""#))
                .unwrap_or_default();
            format!(r#"<a class="c-timestamp" data-ts="{}"{href}>12:00</a>"#, message.ts)
        };

        let mut html = format!(r#"<div class="c-message_group--ia4" data-fake-id="{id}">"#);
        html.push_str(r#"<div class="c-message_kit__actions">"#);
        if message.no_payload {
            html.push_str(&stamp);
        } else {
            html.push_str(r#"<div class="c-search_message"><div class="c-search_message__content">"#);
            if let Some(sender) = &message.sender {
                html.push_str(&format!(
                    r#"<button class="c-message__sender_button"> {sender} </button>"#
                ));
            }
            html.push_str(&stamp);
            html.push_str(r#"<div class="c-message__message_blocks">"#);
            for block in blocks {
                html.push_str(&format!(r#"<div class="p-rich_text_block">{block}</div>"#));
            }
            html.push_str("</div>");
            if message.expanded_blocks.is_some() && !expanded {
                html.push_str(&format!(
                    r#"<button class="c-search__expand" data-fake="expand:{}">Show more</button>"#,
                    message.ts
                ));
            }
            html.push_str("</div></div>");
        }
        html.push_str("</div>");
        if let Some(channel) = &message.channel {
            html.push_str(&format!(r#"<span class="c-channel_entity__name">{channel}</span>"#));
        }
        html.push_str("</div>");
        html
    }

    fn apply_click(&mut self, action: &str) {
        if action == "search-entry" {
            self.search_focused = true;
        } else if let Some(page) = action.strip_prefix("page:") {
            if let Ok(page) = page.parse::<usize>() {
                self.current_page = page;
                self.visited_pages.push(page);
                self.offset = 0;
            }
        } else if let Some(ts) = action.strip_prefix("expand:") {
            self.expanded.insert(ts.to_string());
        } else if let Some(key) = action.strip_prefix("sort:") {
            self.sort_clicked = Some(key.to_string());
        }
    }
}

type Step = (String, usize);

#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    /// Logged-in browser sitting on a submitted search.
    pub fn showing_results(pages: Vec<Vec<FakeMessage>>) -> Self {
        Self::from_state(FakeState {
            url: Some(CLIENT_URL.to_string()),
            logged_in: true,
            submitted_query: Some("fixture".to_string()),
            pages,
            current_page: 1,
            visited_pages: vec![1],
            window: 100,
            ..FakeState::default()
        })
    }

    /// Fresh browser that reaches the workspace without a login prompt.
    pub fn logged_in(pages: Vec<Vec<FakeMessage>>) -> Self {
        Self::from_state(FakeState {
            logged_in: true,
            pages,
            window: 100,
            ..FakeState::default()
        })
    }

    /// Fresh browser that shows a login form; the user finishes logging in
    /// after `after_polls` url checks, or never when `None`.
    pub fn logged_out(pages: Vec<Vec<FakeMessage>>, after_polls: Option<u32>) -> Self {
        Self::from_state(FakeState {
            logged_in: false,
            login_after_polls: after_polls,
            pages,
            window: 100,
            ..FakeState::default()
        })
    }

    pub fn from_state(state: FakeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn select(&self, parent: &[Step], selector: &str) -> Result<Vec<FakeElement>, DriverError> {
        let state = self.state.lock().unwrap();
        state.check()?;
        let document = Html::parse_document(&state.render());
        let scope = resolve(&document, parent)?;
        let parsed = parse_selector(selector)?;
        Ok(scope
            .select(&parsed)
            .enumerate()
            .map(|(index, element)| FakeElement {
                driver: self.clone(),
                path: locate(parent, element, selector, index),
            })
            .collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector)
        .map_err(|err| DriverError::new(DriverErrorKind::Script, format!("{selector}: {err:?}")))
}

fn resolve<'a>(document: &'a Html, path: &[Step]) -> Result<ElementRef<'a>, DriverError> {
    let mut current = document.root_element();
    for (selector, index) in path {
        let parsed = parse_selector(selector)?;
        current = current
            .select(&parsed)
            .nth(*index)
            .ok_or_else(|| DriverError::new(DriverErrorKind::NotFound, "element detached"))?;
    }
    Ok(current)
}

/// Message groups are addressed by their stable id so that scrolling does
/// not invalidate handles to groups that stay on screen.
fn locate(parent: &[Step], element: ElementRef<'_>, selector: &str, index: usize) -> Vec<Step> {
    if let Some(id) = element.value().attr("data-fake-id") {
        return vec![(format!(r#"[data-fake-id="{id}"]"#), 0)];
    }
    let mut path = parent.to_vec();
    path.push((selector.to_string(), index));
    path
}

#[derive(Clone)]
pub struct FakeElement {
    driver: FakeDriver,
    path: Vec<Step>,
}

impl FakeElement {
    fn read<R>(&self, f: impl FnOnce(ElementRef<'_>) -> R) -> Result<R, DriverError> {
        let state = self.driver.state.lock().unwrap();
        state.check()?;
        let document = Html::parse_document(&state.render());
        let element = resolve(&document, &self.path)?;
        Ok(f(element))
    }
}

#[async_trait::async_trait]
impl ElementHandle for FakeElement {
    async fn query_selector(&self, selector: &str) -> Result<Option<Self>, DriverError> {
        Ok(self.driver.select(&self.path, selector)?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, DriverError> {
        self.driver.select(&self.path, selector)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.read(|el| el.value().attr(name).map(str::to_string))
    }

    async fn text_content(&self) -> Result<Option<String>, DriverError> {
        self.read(|el| Some(el.text().collect::<String>()))
    }

    async fn inner_html(&self) -> Result<Option<String>, DriverError> {
        self.read(|el| Some(el.inner_html()))
    }

    async fn click(&self) -> Result<(), DriverError> {
        let action = self.read(|el| el.value().attr("data-fake").map(str::to_string))?;
        if let Some(action) = action {
            self.driver.with_state(|state| state.apply_click(&action));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageDriver for FakeDriver {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.check()?;
            // Signed-out visitors are redirected like the real workspace.
            let landing = if state.logged_in { url } else { SIGNIN_URL };
            state.url = Some(landing.to_string());
            Ok(())
        })
    }

    async fn current_url(&self) -> Result<Option<String>, DriverError> {
        self.with_state(|state| {
            state.check()?;
            if !state.logged_in && state.url.is_some() {
                if let Some(after) = state.login_after_polls {
                    state.url_polls += 1;
                    if state.url_polls >= after {
                        state.logged_in = true;
                        state.url = Some(CLIENT_URL.to_string());
                    }
                }
            }
            Ok(state.url.clone())
        })
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<FakeElement>, DriverError> {
        Ok(self.select(&[], selector)?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<FakeElement>, DriverError> {
        self.select(&[], selector)
    }

    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.check()?;
            if state.search_focused {
                state.typed.push_str(text);
            }
            Ok(())
        })
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.check()?;
            if key == "Enter" && !state.typed.is_empty() {
                state.submitted_query = Some(std::mem::take(&mut state.typed));
                state.current_page = 1;
                state.visited_pages.push(1);
                state.offset = 0;
            }
            Ok(())
        })
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        self.with_state(|state| state.check())?;
        Ok(match script {
            "window.innerWidth" => json!(VIEWPORT.0),
            "window.innerHeight" => json!(VIEWPORT.1),
            _ => Value::Null,
        })
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.check()?;
            state.mouse_moves.push((x, y));
            Ok(())
        })
    }

    async fn mouse_wheel(&self, _delta_x: f64, delta_y: f64) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.check()?;
            state.wheel_count += 1;
            if state
                .disconnect_after_wheels
                .is_some_and(|limit| state.wheel_count >= limit)
            {
                state.disconnected = true;
                return state.check();
            }
            if delta_y > 0.0 {
                state.offset = (state.offset + 1).min(state.max_offset());
            }
            Ok(())
        })
    }

    async fn persist_session_state(&self, path: &Path) -> Result<(), DriverError> {
        self.with_state(|state| state.check())?;
        std::fs::write(path, SESSION_BLOB)
            .map_err(|err| DriverError::new(DriverErrorKind::Io, err.to_string()))?;
        self.with_state(|state| state.persisted_to = Some(path.to_path_buf()));
        Ok(())
    }

    async fn restore_session_state(&self, path: &Path) -> Result<(), DriverError> {
        let blob = std::fs::read_to_string(path)
            .map_err(|err| DriverError::new(DriverErrorKind::Io, err.to_string()))?;
        self.with_state(|state| {
            state.check()?;
            state.restored_from = Some(path.to_path_buf());
            if blob == SESSION_BLOB {
                state.logged_in = true;
            }
            Ok(())
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.with_state(|state| state.closed = true);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<HarvestEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<HarvestEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Cancels `token` once a page reports `after` written messages.
pub struct CancelAfterWrites {
    pub token: CancellationToken,
    pub after: usize,
}

impl ProgressSink for CancelAfterWrites {
    fn emit(&self, event: HarvestEvent) {
        if let HarvestEvent::Progress { current, .. } = event {
            if current >= self.after {
                self.token.cancel();
            }
        }
    }
}

/// Default selectors and timings with a short idle window.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.harvest.idle_polls_limit = 3;
    config
}

/// In-memory export storage that can be told to run out of space part way
/// through a write.
#[derive(Debug, Clone, Default)]
pub struct FlakyDisk {
    state: Arc<Mutex<DiskState>>,
}

#[derive(Debug, Default)]
struct DiskState {
    bytes: Vec<u8>,
    position: usize,
    /// Write this many bytes of the next record, then fail.
    fail_after: Option<usize>,
}

impl FlakyDisk {
    /// The next write stores `partial` bytes and then fails.
    pub fn fail_next_write(&self, partial: usize) {
        self.state.lock().unwrap().fail_after = Some(partial);
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.state.lock().unwrap().bytes.clone()).unwrap()
    }
}

impl Write for FlakyDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let (take, fail) = match state.fail_after.take() {
            Some(partial) => (partial.min(buf.len()), true),
            None => (buf.len(), false),
        };
        let start = state.position;
        let end = start + take;
        if state.bytes.len() < end {
            state.bytes.resize(end, 0);
        }
        state.bytes[start..end].copy_from_slice(&buf[..take]);
        state.position = end;
        if fail {
            return Err(io::Error::other("no space left on device"));
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FlakyDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.lock().unwrap();
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => state.bytes.len() as i64 + delta,
            SeekFrom::Current(delta) => state.position as i64 + delta,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "negative seek"));
        }
        state.position = target as usize;
        Ok(target as u64)
    }
}

impl ExportTarget for FlakyDisk {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.state.lock().unwrap().bytes.truncate(len as usize);
        Ok(())
    }
}
