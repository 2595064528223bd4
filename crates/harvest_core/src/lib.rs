//! Harvest core: pure session state machine and summary view.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{AbortReason, PageNumber, Session, SessionOutcome, SessionState};
pub use update::update;
pub use view_model::SessionSummary;
