use engine_logging::{engine_debug, engine_info};
use harvest_core::SessionState;
use harvest_engine::{HarvestEvent, ProgressSink};

/// Reports engine progress through the logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::StateChanged(state) => engine_debug!("Session state: {}", describe(state)),
            HarvestEvent::TotalResults(total) => engine_info!("Search reports {} results", total),
            HarvestEvent::PageStarted { page } => engine_info!("Harvesting results page {}", page),
            HarvestEvent::Progress {
                current, total, ..
            } => engine_debug!("{}/{} messages", current, total),
            HarvestEvent::MessageRejected { reason, .. } => {
                engine_debug!("Skipped message: {}", reason)
            }
            HarvestEvent::PageFinished(report) => engine_info!(
                "Page {} done: {} new, {} written",
                report.page,
                report.discovered,
                report.written
            ),
        }
    }
}

pub fn describe(state: SessionState) -> String {
    match state {
        SessionState::Init => "starting".to_string(),
        SessionState::Authenticating => "signing in".to_string(),
        SessionState::SearchInitiated => "search submitted".to_string(),
        SessionState::HarvestingPage(page) => format!("harvesting page {page}"),
        SessionState::Paginating { from, to } => format!("moving from page {from} to {to}"),
        SessionState::Finished => "finished".to_string(),
        SessionState::Aborted(reason) => format!("aborted ({reason:?})"),
    }
}
