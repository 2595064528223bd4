use crate::PageNumber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Runner started the session.
    Start,
    /// Workspace session is established.
    LoginSucceeded,
    /// Login could not be completed.
    LoginFailed,
    /// Query was submitted and results content appeared.
    SearchSubmitted,
    /// Query could not be submitted or no results view appeared.
    SearchFailed,
    /// Runner began draining `page`.
    HarvestStarted { page: PageNumber },
    /// Runner finished draining `page`.
    PageHarvested {
        page: PageNumber,
        discovered: usize,
        written: usize,
    },
    /// Results view moved to `page` and finished loading.
    PageAdvanced { page: PageNumber },
    /// Next page control is absent or disabled.
    NoMorePages,
    /// Unrecoverable driver error.
    DriverFailed,
    /// External interrupt observed at a wait point.
    CancelRequested,
}
