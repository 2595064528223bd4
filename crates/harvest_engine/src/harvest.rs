use std::collections::HashSet;
use std::sync::Arc;

use harvest_core::PageNumber;
use tokio_util::sync::CancellationToken;

use crate::export::ExportSink;
use crate::extract::PageExtractor;
use crate::progress::{HarvestEvent, ProgressSink};
use crate::settings::{HarvestSettings, Selectors};
use crate::wait::{cancellable, pause};
use crate::{DriverError, ElementHandle, Extraction, HarvestError, PageDriver, PageReport};

const FALLBACK_VIEWPORT: (f64, f64) = (1280.0, 800.0);

/// Scroll-driven discovery over one results page at a time.
///
/// The dedup set lives as long as the harvester, so a timestamp seen on one
/// page is never written again on a later one.
pub struct MessageHarvester {
    extractor: PageExtractor,
    selectors: Selectors,
    settings: HarvestSettings,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    seen: HashSet<String>,
}

impl MessageHarvester {
    pub fn new(
        extractor: PageExtractor,
        selectors: Selectors,
        settings: HarvestSettings,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            extractor,
            selectors,
            settings,
            progress,
            cancel,
            seen: HashSet::new(),
        }
    }

    /// Timestamps seen so far in this session.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Drains the currently loaded page until it stays idle for
    /// `idle_polls_limit` passes. A wait timeout also ends the page.
    pub async fn harvest<D: PageDriver>(
        &mut self,
        driver: &D,
        page: PageNumber,
        sink: &mut ExportSink,
    ) -> Result<PageReport, HarvestError> {
        self.progress.emit(HarvestEvent::PageStarted { page });
        let mut report = PageReport {
            page,
            discovered: 0,
            written: 0,
        };

        match self.drain(driver, sink, &mut report).await {
            Ok(()) => {}
            Err(HarvestError::WaitTimeout { what }) => {
                engine_logging::engine_info!("Page treated as exhausted after timeout: {what}");
            }
            Err(err) => return Err(err),
        }

        engine_logging::engine_info!(
            "Page done: {} new message(s), {} written",
            report.discovered,
            report.written
        );
        self.progress.emit(HarvestEvent::PageFinished(report));
        Ok(report)
    }

    async fn drain<D: PageDriver>(
        &mut self,
        driver: &D,
        sink: &mut ExportSink,
        report: &mut PageReport,
    ) -> Result<(), HarvestError> {
        self.center_mouse(driver).await?;

        let mut idle_polls = 0u32;
        loop {
            let groups =
                cancellable(&self.cancel, driver.query_selector_all(&self.selectors.message_group))
                    .await?;

            let mut fresh = 0usize;
            for group in &groups {
                let Some(key) = self.dedup_key(group).await? else {
                    continue;
                };
                if !self.seen.insert(key.clone()) {
                    continue;
                }
                fresh += 1;
                report.discovered += 1;
                self.process_group(driver, group, &key, sink, report).await?;
            }

            if fresh == 0 {
                idle_polls += 1;
            } else {
                idle_polls = 0;
                self.progress.emit(HarvestEvent::Progress {
                    page: report.page,
                    current: report.written,
                    total: self.settings.per_page_target.max(report.written),
                });
            }
            if idle_polls >= self.settings.idle_polls_limit {
                engine_logging::engine_debug!("No new messages for {idle_polls} passes");
                return Ok(());
            }

            cancellable(&self.cancel, driver.mouse_wheel(0.0, self.settings.scroll_delta)).await?;
            pause(driver, &self.cancel, self.settings.poll_interval).await?;
        }
    }

    /// Cheap timestamp lookup; `None` for groups without one.
    async fn dedup_key<E: ElementHandle>(&self, group: &E) -> Result<Option<String>, HarvestError> {
        let lookup = async {
            match group.query_selector(&self.selectors.group_timestamp).await? {
                Some(stamp) => stamp.attribute(&self.selectors.timestamp_attribute).await,
                None => Ok::<_, DriverError>(None),
            }
        };
        match cancellable(&self.cancel, lookup).await {
            Ok(key) => Ok(key.filter(|k| !k.trim().is_empty())),
            Err(err) if err.is_node_local() => {
                engine_logging::engine_debug!("Skipping group without readable timestamp: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn process_group<D: PageDriver>(
        &self,
        driver: &D,
        group: &D::Element,
        key: &str,
        sink: &mut ExportSink,
        report: &mut PageReport,
    ) -> Result<(), HarvestError> {
        match self.extractor.extract(driver, group, &self.cancel).await {
            Ok(Extraction::Accepted(message)) => match sink.write(&message) {
                Ok(()) => report.written += 1,
                Err(err) => {
                    let err = HarvestError::WriteFailure(err);
                    engine_logging::engine_error!("Dropping message {key}: {err}");
                }
            },
            Ok(Extraction::Rejected(reason)) => {
                self.progress.emit(HarvestEvent::MessageRejected {
                    page: report.page,
                    reason,
                });
            }
            Err(err) if err.is_node_local() => {
                engine_logging::engine_warn!("Skipping message {key}: {err}");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn center_mouse<D: PageDriver>(&self, driver: &D) -> Result<(), HarvestError> {
        let width = self.viewport_dimension(driver, "window.innerWidth").await?;
        let height = self.viewport_dimension(driver, "window.innerHeight").await?;
        let x = width.unwrap_or(FALLBACK_VIEWPORT.0) / 2.0;
        let y = height.unwrap_or(FALLBACK_VIEWPORT.1) / 2.0;
        cancellable(&self.cancel, driver.mouse_move(x, y)).await
    }

    async fn viewport_dimension<D: PageDriver>(
        &self,
        driver: &D,
        script: &str,
    ) -> Result<Option<f64>, HarvestError> {
        match cancellable(&self.cancel, driver.evaluate(script)).await {
            Ok(value) => Ok(value.as_f64().filter(|v| *v > 0.0)),
            Err(err) if err.is_node_local() => {
                engine_logging::engine_debug!("{script} unavailable: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
