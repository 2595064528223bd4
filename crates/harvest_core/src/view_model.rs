use crate::{SessionOutcome, SessionState};

/// Read-only snapshot for reporting; `outcome` is set once the session is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub state: SessionState,
    pub pages_harvested: u32,
    pub messages_written: usize,
    pub outcome: Option<SessionOutcome>,
}
