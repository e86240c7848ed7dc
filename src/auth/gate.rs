//! View-level access gate.
//!
//! A pure function of the session phase: protected views ask the gate
//! what to do before rendering. `Restoring` renders a neutral loading
//! state so a reload never flashes the login screen; `Authenticating` is
//! treated like `Unauthenticated` because the login screen itself owns
//! that transient state.

use super::session::Phase;

/// What a protected view should do for the current session phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision<R> {
    /// Session is authenticated - render the guarded content
    Render,
    /// Session restore has not resolved yet - render a loading state
    Loading,
    /// Send the user to the login screen, remembering where they were headed
    RedirectToLogin { resume: R },
}

pub fn decide<R>(phase: Phase, requested: R) -> GateDecision<R> {
    match phase {
        Phase::Authenticated => GateDecision::Render,
        Phase::Restoring => GateDecision::Loading,
        Phase::Unauthenticated | Phase::Authenticating | Phase::Error => {
            GateDecision::RedirectToLogin { resume: requested }
        }
    }
}
