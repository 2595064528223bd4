//! Chrome DevTools implementation of the engine's page driver.
//!
//! One browser, one tab. The CDP connection is serviced by a background task
//! that flips `closed` when the browser goes away, after which every call
//! reports [`DriverErrorKind::Disconnected`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Handler, Page};
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use harvest_engine::{write_atomically, DriverError, DriverErrorKind, ElementHandle, PageDriver};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const WINDOW_SIZE: (u32, u32) = (1280, 900);

#[derive(Debug, Clone, Default)]
struct Link {
    closed: Arc<AtomicBool>,
}

impl Link {
    fn error(&self, err: CdpError) -> DriverError {
        if self.closed.load(Ordering::SeqCst) {
            return DriverError::new(DriverErrorKind::Disconnected, err.to_string());
        }
        let kind = match &err {
            CdpError::Timeout => DriverErrorKind::Timeout,
            CdpError::NotFound => DriverErrorKind::NotFound,
            CdpError::JavascriptException(_) => DriverErrorKind::Script,
            CdpError::Io(_) => DriverErrorKind::Io,
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                DriverErrorKind::Disconnected
            }
            _ => DriverErrorKind::Script,
        };
        DriverError::new(kind, err.to_string())
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::new(
                DriverErrorKind::Disconnected,
                "browser connection closed",
            ))
        } else {
            Ok(())
        }
    }
}

pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
    link: Link,
    pointer: Mutex<(f64, f64)>,
}

impl ChromiumDriver {
    pub async fn launch(headless: bool) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder().window_size(WINDOW_SIZE.0, WINDOW_SIZE.1);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|err| anyhow!("invalid browser configuration: {err}"))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|err| anyhow!("failed to launch browser: {err}"))?;
        let link = Link::default();
        let handler_task = spawn_handler_task(handler, Arc::clone(&link.closed));

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| anyhow!("failed to open a browser tab: {err}"))?;
        engine_info!("Browser launched (headless: {})", headless);

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
            link,
            pointer: Mutex::new((0.0, 0.0)),
        })
    }

    fn element(&self, element: Element) -> ChromiumElement {
        ChromiumElement {
            element,
            link: self.link.clone(),
        }
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        delta: (f64, f64),
    ) -> Result<(), DriverError> {
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .delta_x(delta.0)
            .delta_y(delta.1)
            .build()
            .map_err(|err| DriverError::new(DriverErrorKind::Script, err))?;
        self.page
            .execute(params)
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(())
    }
}

fn spawn_handler_task(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                engine_debug!("CDP handler event error: {}", err);
            }
        }
        closed.store(true, Ordering::SeqCst);
    })
}

/// Key name, DOM code, Windows virtual key code and inserted text.
fn key_definition(key: &str) -> Option<(&'static str, &'static str, i64, Option<&'static str>)> {
    match key {
        "Enter" => Some(("Enter", "Enter", 13, Some("\r"))),
        "Tab" => Some(("Tab", "Tab", 9, None)),
        "Escape" => Some(("Escape", "Escape", 27, None)),
        "Backspace" => Some(("Backspace", "Backspace", 8, None)),
        _ => None,
    }
}

#[async_trait::async_trait]
impl PageDriver for ChromiumDriver {
    type Element = ChromiumElement;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        engine_debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>, DriverError> {
        self.link.ensure_open()?;
        self.page.url().await.map_err(|err| self.link.error(err))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>, DriverError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element>, DriverError> {
        self.link.ensure_open()?;
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(elements.into_iter().map(|e| self.element(e)).collect())
    }

    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        let (name, code, virtual_code, text) = key_definition(key).ok_or_else(|| {
            DriverError::new(DriverErrorKind::Script, format!("unsupported key {key}"))
        })?;
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(name)
                .code(code)
                .windows_virtual_key_code(virtual_code)
                .native_virtual_key_code(virtual_code);
            if let (DispatchKeyEventType::KeyDown, Some(text)) = (&kind, text) {
                builder = builder.text(text);
            }
            let params = builder
                .build()
                .map_err(|err| DriverError::new(DriverErrorKind::Script, err))?;
            self.page
                .execute(params)
                .await
                .map_err(|err| self.link.error(err))?;
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        self.link.ensure_open()?;
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, (0.0, 0.0))
            .await?;
        *self.pointer.lock().await = (x, y);
        Ok(())
    }

    async fn mouse_wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        let (x, y) = *self.pointer.lock().await;
        self.dispatch_mouse(DispatchMouseEventType::MouseWheel, x, y, (delta_x, delta_y))
            .await
    }

    async fn persist_session_state(&self, path: &Path) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|err| self.link.error(err))?;
        let bytes = serde_json::to_vec_pretty(&cookies)
            .map_err(|err| DriverError::new(DriverErrorKind::Io, err.to_string()))?;
        write_atomically(path, &bytes)
            .map_err(|err| DriverError::new(DriverErrorKind::Io, err.to_string()))?;
        engine_info!("Saved {} cookies to {:?}", cookies.len(), path);
        Ok(())
    }

    async fn restore_session_state(&self, path: &Path) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::Io, err.to_string()))?;
        let cookies: Vec<CookieParam> = serde_json::from_slice(&bytes)
            .map_err(|err| DriverError::new(DriverErrorKind::Io, err.to_string()))?;
        let count = cookies.len();
        self.page
            .set_cookies(cookies)
            .await
            .map_err(|err| self.link.error(err))?;
        engine_info!("Restored {} cookies from {:?}", count, path);
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let result = browser.close().await;
        if let Err(err) = browser.wait().await {
            engine_warn!("Browser process did not exit cleanly: {}", err);
        }
        self.handler_task.abort();
        self.link.closed.store(true, Ordering::SeqCst);
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(DriverError::new(DriverErrorKind::Io, err.to_string())),
        }
    }
}

pub struct ChromiumElement {
    element: Element,
    link: Link,
}

impl ChromiumElement {
    fn wrap(&self, element: Element) -> Self {
        Self {
            element,
            link: self.link.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ElementHandle for ChromiumElement {
    async fn query_selector(&self, selector: &str) -> Result<Option<Self>, DriverError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self>, DriverError> {
        self.link.ensure_open()?;
        let elements = self
            .element
            .find_elements(selector)
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(elements.into_iter().map(|e| self.wrap(e)).collect())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.link.ensure_open()?;
        self.element
            .attribute(name)
            .await
            .map_err(|err| self.link.error(err))
    }

    async fn text_content(&self) -> Result<Option<String>, DriverError> {
        self.link.ensure_open()?;
        let returns = self
            .element
            .call_js_fn("function() { return this.textContent; }", false)
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(returns
            .result
            .value
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    async fn inner_html(&self) -> Result<Option<String>, DriverError> {
        self.link.ensure_open()?;
        self.element
            .inner_html()
            .await
            .map_err(|err| self.link.error(err))
    }

    async fn click(&self) -> Result<(), DriverError> {
        self.link.ensure_open()?;
        self.element
            .click()
            .await
            .map_err(|err| self.link.error(err))?;
        Ok(())
    }
}
