use harvest_core::{PageNumber, SessionState};

use crate::{PageReport, Rejection};

/// What the engine reports while it runs. Purely informational; nothing in
/// the engine depends on a sink consuming these.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    StateChanged(SessionState),
    /// Result count shown by the search page, when it could be read.
    TotalResults(u64),
    PageStarted { page: PageNumber },
    /// `total` is an estimate that never drops below `current`.
    Progress {
        page: PageNumber,
        current: usize,
        total: usize,
    },
    MessageRejected { page: PageNumber, reason: Rejection },
    PageFinished(PageReport),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: HarvestEvent) {}
}
