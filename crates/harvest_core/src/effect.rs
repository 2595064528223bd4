use crate::{PageNumber, SessionOutcome};

/// Work the runner must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Establish (or restore) a logged-in workspace session.
    Authenticate,
    /// Issue the search query and wait for the first results page.
    SubmitSearch,
    /// Drain the currently loaded results page.
    HarvestPage { page: PageNumber },
    /// Move from `from` to `from + 1`.
    AdvancePage { from: PageNumber },
    /// Close the export sink and release the browser session.
    Finalize { outcome: SessionOutcome },
}
