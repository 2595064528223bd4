//! Effect runner for one harvesting session.
//!
//! `harvest_core::update` decides what happens next; this module performs
//! the resulting effects against the page driver and feeds their outcome back
//! as messages. The export sink and the driver are released on every path out
//! of [`Orchestrator::run`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use harvest_core::{update, AbortReason, Effect, Msg, Session, SessionOutcome, SessionSummary};
use tokio_util::sync::CancellationToken;

use crate::export::{ExportFormat, ExportSink, ExportSummary};
use crate::extract::PageExtractor;
use crate::harvest::MessageHarvester;
use crate::paginate::PaginationController;
use crate::progress::{HarvestEvent, NullProgressSink, ProgressSink};
use crate::session::{SearchNavigator, WorkspaceLogin};
use crate::settings::EngineConfig;
use crate::{HarvestError, PageDriver};

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub workspace_url: String,
    /// Session-state file; restored when present, written after a login.
    pub auth_file: PathBuf,
    pub output: PathBuf,
    pub format: ExportFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub summary: SessionSummary,
    /// `None` only when closing the export failed.
    pub export: Option<ExportSummary>,
    pub total_results: Option<u64>,
}

impl SessionReport {
    /// Records on disk, including any from a page cut short by an abort.
    pub fn messages_written(&self) -> usize {
        self.export
            .as_ref()
            .map_or(self.summary.messages_written, |export| export.written)
    }
}

pub struct Orchestrator<D: PageDriver> {
    driver: D,
    config: EngineConfig,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressSink>,
}

impl<D: PageDriver> Orchestrator<D> {
    pub fn new(driver: D, config: EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            driver,
            config,
            cancel,
            progress: Arc::new(NullProgressSink),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the session to completion. `Err` only when the export file could
    /// not be created; everything after that ends in a [`SessionReport`].
    pub async fn run(self, request: &SearchRequest) -> Result<SessionReport, HarvestError> {
        let mut sink = match ExportSink::create(&request.output, request.format) {
            Ok(sink) => sink,
            Err(err) => {
                self.release_driver().await;
                return Err(HarvestError::WriteFailure(err));
            }
        };

        let (session, total_results) = self.drive(request, &mut sink).await;

        let export = match sink.close() {
            Ok(summary) => Some(summary),
            Err(err) => {
                engine_logging::engine_error!("Closing export failed: {err}");
                None
            }
        };
        self.release_driver().await;
        engine_logging::set_current_page(0);

        let summary = session.summary();
        let outcome = summary
            .outcome
            .unwrap_or(SessionOutcome::Aborted(AbortReason::DriverFailure));
        engine_logging::engine_info!("Session ended: {outcome:?}");
        Ok(SessionReport {
            outcome,
            summary,
            export,
            total_results,
        })
    }

    async fn drive(&self, request: &SearchRequest, sink: &mut ExportSink) -> (Session, Option<u64>) {
        let config = &self.config;
        let extractor = PageExtractor::new(
            config.selectors.clone(),
            config.harvest.clone(),
            config.extractor,
        );
        let mut harvester = MessageHarvester::new(
            extractor,
            config.selectors.clone(),
            config.harvest.clone(),
            Arc::clone(&self.progress),
            self.cancel.clone(),
        );
        let pagination = PaginationController::new(
            config.selectors.clone(),
            config.harvest.clone(),
            self.cancel.clone(),
        );
        let login = WorkspaceLogin::new(&config.selectors, &config.login, &self.cancel);
        let search = SearchNavigator::new(&config.selectors, &config.search, &self.cancel);

        let mut session = Session::new();
        let mut total_results = None;
        let mut queue = VecDeque::new();
        session = self.dispatch(session, Msg::Start, &mut queue);

        while let Some(effect) = queue.pop_front() {
            if self.cancel.is_cancelled() && !matches!(effect, Effect::Finalize { .. }) {
                queue.clear();
                session = self.dispatch(session, Msg::CancelRequested, &mut queue);
                continue;
            }

            let msg = match effect {
                Effect::Authenticate => {
                    match login
                        .authenticate(&self.driver, &request.workspace_url, &request.auth_file)
                        .await
                    {
                        Ok(outcome) => {
                            engine_logging::engine_debug!("Login outcome: {outcome:?}");
                            Msg::LoginSucceeded
                        }
                        Err(err) => failure_msg(err, Msg::LoginFailed),
                    }
                }
                Effect::SubmitSearch => match search.submit(&self.driver, &request.query).await {
                    Ok(()) => match search.read_total_results(&self.driver).await {
                        Ok(total) => {
                            if let Some(total) = total {
                                engine_logging::engine_info!("Search reports {total} result(s)");
                                self.progress.emit(HarvestEvent::TotalResults(total));
                            }
                            total_results = total;
                            Msg::SearchSubmitted
                        }
                        Err(err) => failure_msg(err, Msg::SearchFailed),
                    },
                    Err(err) => failure_msg(err, Msg::SearchFailed),
                },
                Effect::HarvestPage { page } => {
                    session = self.dispatch(session, Msg::HarvestStarted { page }, &mut queue);
                    engine_logging::set_current_page(page);
                    match harvester.harvest(&self.driver, page, sink).await {
                        Ok(report) => Msg::PageHarvested {
                            page,
                            discovered: report.discovered,
                            written: report.written,
                        },
                        Err(err) => failure_msg(err, Msg::DriverFailed),
                    }
                }
                Effect::AdvancePage { from } => match pagination.advance(&self.driver, from).await {
                    Ok(true) => Msg::PageAdvanced { page: from + 1 },
                    Ok(false) => Msg::NoMorePages,
                    Err(err) => failure_msg(err, Msg::DriverFailed),
                },
                Effect::Finalize { outcome } => {
                    engine_logging::engine_debug!("Finalizing with {outcome:?}");
                    break;
                }
            };
            session = self.dispatch(session, msg, &mut queue);
        }

        (session, total_results)
    }

    fn dispatch(&self, session: Session, msg: Msg, queue: &mut VecDeque<Effect>) -> Session {
        let before = session.state();
        let (session, effects) = update(session, msg);
        let after = session.state();
        if after != before {
            engine_logging::engine_debug!("State {before:?} -> {after:?}");
            self.progress.emit(HarvestEvent::StateChanged(after));
        }
        queue.extend(effects);
        session
    }

    async fn release_driver(&self) {
        if let Err(err) = self.driver.close().await {
            engine_logging::engine_warn!("Closing browser session failed: {err}");
        }
    }
}

fn failure_msg(err: HarvestError, fallback: Msg) -> Msg {
    match err {
        HarvestError::Cancelled => {
            engine_logging::engine_warn!("Cancelled");
            Msg::CancelRequested
        }
        err => {
            engine_logging::engine_error!("{err}");
            fallback
        }
    }
}
