use crate::view_model::SessionSummary;

/// 1-based results page index.
pub type PageNumber = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Init,
    Authenticating,
    SearchInitiated,
    HarvestingPage(PageNumber),
    Paginating {
        from: PageNumber,
        to: PageNumber,
    },
    Finished,
    Aborted(AbortReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Aborted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    LoginFailed,
    SearchFailed,
    DriverFailure,
    Cancelled,
}

/// How a session ended; `Finished` and `Aborted` differ only in this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    state: SessionState,
    pages_harvested: u32,
    messages_written: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.state,
            pages_harvested: self.pages_harvested,
            messages_written: self.messages_written,
            outcome: self.outcome(),
        }
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self.state {
            SessionState::Finished => Some(SessionOutcome::Completed),
            SessionState::Aborted(reason) => Some(SessionOutcome::Aborted(reason)),
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn record_page(&mut self, written: usize) {
        self.pages_harvested += 1;
        self.messages_written += written;
    }
}
