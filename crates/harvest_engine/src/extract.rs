use std::sync::LazyLock;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::convert::{ConvertOptions, Converter, HtmlTextConverter};
use crate::normalize::normalize_text;
use crate::preview::{text_preview, MAX_PREVIEW_CHARS};
use crate::settings::{ExtractorOptions, HarvestSettings, Selectors};
use crate::wait::{cancellable, pause};
use crate::{ElementHandle, Extraction, HarvestError, Message, PageDriver, Rejection, WaitState};

static ARCHIVES_CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/archives/([^/?#]+)/").expect("static regex"));

/// Turns one message-group node into a [`Message`] or a [`Rejection`].
pub struct PageExtractor {
    selectors: Selectors,
    settings: HarvestSettings,
    options: ExtractorOptions,
    converter: Box<dyn Converter>,
}

impl PageExtractor {
    pub fn new(selectors: Selectors, settings: HarvestSettings, options: ExtractorOptions) -> Self {
        Self::with_converter(
            selectors,
            settings,
            options,
            Box::new(HtmlTextConverter::new(ConvertOptions::default())),
        )
    }

    pub fn with_converter(
        selectors: Selectors,
        settings: HarvestSettings,
        options: ExtractorOptions,
        converter: Box<dyn Converter>,
    ) -> Self {
        Self {
            selectors,
            settings,
            options,
            converter,
        }
    }

    /// Missing fields come back as `Ok(Extraction::Rejected(_))`; `Err` is
    /// reserved for driver failures and cancellation.
    pub async fn extract<D: PageDriver>(
        &self,
        driver: &D,
        group: &D::Element,
        cancel: &CancellationToken,
    ) -> Result<Extraction, HarvestError> {
        let extraction = self.run_steps(driver, group, cancel).await?;
        match &extraction {
            Extraction::Accepted(message) if self.options.verbose => {
                engine_logging::engine_info!(
                    "Accepted {} from {}: {}",
                    message.timestamp,
                    message.sender,
                    text_preview(&message.text, MAX_PREVIEW_CHARS)
                );
            }
            Extraction::Rejected(reason) if self.options.verbose => {
                engine_logging::engine_info!("Rejected message group: {reason}");
            }
            Extraction::Rejected(reason) => {
                engine_logging::engine_debug!("Rejected message group: {reason}");
            }
            Extraction::Accepted(_) => {}
        }
        Ok(extraction)
    }

    async fn run_steps<D: PageDriver>(
        &self,
        driver: &D,
        group: &D::Element,
        cancel: &CancellationToken,
    ) -> Result<Extraction, HarvestError> {
        let selectors = &self.selectors;

        let Some(_payload) = cancellable(cancel, group.query_selector(&selectors.message)).await?
        else {
            return Ok(Extraction::Rejected(Rejection::NoMessageElement));
        };

        let Some(stamp) = cancellable(cancel, group.query_selector(&selectors.timestamp)).await?
        else {
            return Ok(Extraction::Rejected(Rejection::NoTimestamp));
        };
        let raw_ts = cancellable(cancel, stamp.attribute(&selectors.timestamp_attribute)).await?;
        let Some(timestamp) = raw_ts.as_deref().and_then(parse_timestamp) else {
            return Ok(Extraction::Rejected(Rejection::NoTimestamp));
        };

        let Some(sender_el) = cancellable(cancel, group.query_selector(&selectors.sender)).await?
        else {
            return Ok(Extraction::Rejected(Rejection::NoSender));
        };
        let sender = cancellable(cancel, sender_el.text_content())
            .await?
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if sender.is_empty() {
            return Ok(Extraction::Rejected(Rejection::NoSender));
        }

        self.expand_if_truncated(driver, group, cancel).await?;

        let text = self.read_text(group, cancel).await?;
        if text.is_empty() {
            return Ok(Extraction::Rejected(Rejection::NoText));
        }

        let channel = self.resolve_channel(group, &stamp, cancel).await?;

        Ok(Extraction::Accepted(Message {
            timestamp,
            sender,
            text,
            channel,
        }))
    }

    /// Best effort: only cancellation escapes this step.
    async fn expand_if_truncated<D: PageDriver>(
        &self,
        driver: &D,
        group: &D::Element,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        match self.try_expand(driver, group, cancel).await {
            Ok(()) => Ok(()),
            Err(HarvestError::Cancelled) => Err(HarvestError::Cancelled),
            Err(err) => {
                engine_logging::engine_debug!("Expanding truncated message failed: {err}");
                Ok(())
            }
        }
    }

    async fn try_expand<D: PageDriver>(
        &self,
        driver: &D,
        group: &D::Element,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        let mut control = None;
        for selector in &self.selectors.show_more {
            if let Some(found) = cancellable(cancel, group.query_selector(selector)).await? {
                control = Some(found);
                break;
            }
        }
        let Some(control) = control else {
            return Ok(());
        };

        cancellable(cancel, control.click()).await?;
        pause(driver, cancel, self.settings.expand_settle).await?;
        cancellable(
            cancel,
            driver.wait_for_selector(
                &self.selectors.loading_indicator,
                self.settings.loading_timeout,
                WaitState::Hidden,
            ),
        )
        .await?;
        Ok(())
    }

    async fn read_text<E: ElementHandle>(
        &self,
        group: &E,
        cancel: &CancellationToken,
    ) -> Result<String, HarvestError> {
        let blocks = cancellable(cancel, group.query_selector_all(&self.selectors.content_blocks)).await?;
        let mut parts = Vec::with_capacity(blocks.len());
        for block in &blocks {
            if let Some(html) = cancellable(cancel, block.inner_html()).await? {
                parts.push(self.converter.to_text(&html));
            }
        }
        Ok(normalize_text(&parts.join("\n")))
    }

    async fn resolve_channel<E: ElementHandle>(
        &self,
        group: &E,
        stamp: &E,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, HarvestError> {
        if let Some(name_el) = cancellable(cancel, group.query_selector(&self.selectors.channel_name)).await? {
            let name = cancellable(cancel, name_el.text_content())
                .await?
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            if !name.is_empty() {
                return Ok(Some(name));
            }
        }
        let href = cancellable(cancel, stamp.attribute("href")).await?;
        Ok(href.as_deref().and_then(channel_from_href))
    }
}

/// Raw `data-ts` value as Unix seconds; `None` unless it is a finite number.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|ts| ts.is_finite())
}

/// Channel id from a permalink such as `/archives/C123ABC/p1690000000000100`.
pub fn channel_from_href(href: &str) -> Option<String> {
    ARCHIVES_CHANNEL
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}
