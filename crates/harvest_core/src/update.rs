use crate::{AbortReason, Effect, Msg, Session, SessionOutcome, SessionState};

/// Pure update function: applies a message to the session and returns any effects.
///
/// Messages that do not apply to the current state are ignored. `Finished` and
/// `Aborted` absorb everything.
pub fn update(mut session: Session, msg: Msg) -> (Session, Vec<Effect>) {
    let state = session.state();
    if state.is_terminal() {
        return (session, Vec::new());
    }

    let effects = match (state, msg) {
        (_, Msg::CancelRequested) => abort(&mut session, AbortReason::Cancelled),
        (_, Msg::DriverFailed) => abort(&mut session, AbortReason::DriverFailure),
        (SessionState::Init, Msg::Start) => {
            session.set_state(SessionState::Authenticating);
            vec![Effect::Authenticate]
        }
        (SessionState::Authenticating, Msg::LoginSucceeded) => vec![Effect::SubmitSearch],
        (SessionState::Authenticating, Msg::LoginFailed) => {
            abort(&mut session, AbortReason::LoginFailed)
        }
        (SessionState::Authenticating, Msg::SearchFailed) => {
            abort(&mut session, AbortReason::SearchFailed)
        }
        (SessionState::Authenticating, Msg::SearchSubmitted) => {
            session.set_state(SessionState::SearchInitiated);
            vec![Effect::HarvestPage { page: 1 }]
        }
        (SessionState::SearchInitiated, Msg::HarvestStarted { page: 1 }) => {
            session.set_state(SessionState::HarvestingPage(1));
            Vec::new()
        }
        (SessionState::Paginating { to, .. }, Msg::HarvestStarted { page }) if page == to => {
            session.set_state(SessionState::HarvestingPage(page));
            Vec::new()
        }
        (
            SessionState::HarvestingPage(current),
            Msg::PageHarvested {
                page,
                discovered,
                written,
            },
        ) if page == current => {
            session.record_page(written);
            if discovered == 0 {
                finish(&mut session)
            } else {
                session.set_state(SessionState::Paginating {
                    from: current,
                    to: current + 1,
                });
                vec![Effect::AdvancePage { from: current }]
            }
        }
        (SessionState::Paginating { to, .. }, Msg::PageAdvanced { page }) if page == to => {
            vec![Effect::HarvestPage { page }]
        }
        (SessionState::Paginating { .. }, Msg::NoMorePages) => finish(&mut session),
        _ => Vec::new(),
    };

    (session, effects)
}

fn finish(session: &mut Session) -> Vec<Effect> {
    session.set_state(SessionState::Finished);
    vec![Effect::Finalize {
        outcome: SessionOutcome::Completed,
    }]
}

fn abort(session: &mut Session, reason: AbortReason) -> Vec<Effect> {
    session.set_state(SessionState::Aborted(reason));
    vec![Effect::Finalize {
        outcome: SessionOutcome::Aborted(reason),
    }]
}
