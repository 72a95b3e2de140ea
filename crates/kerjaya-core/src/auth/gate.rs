//! Render-or-redirect decision for protected views.

use tokio::sync::watch;

use super::{Session, SessionState};

/// Where unauthenticated users are sent.
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render(Session),
    Redirect(&'static str),
}

/// Protected content, or the route to go to instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<T> {
    Render(T),
    Redirect(&'static str),
}

/// Read-only guard over the manager's published state. It never mutates the
/// session and never touches the network.
#[derive(Clone)]
pub struct AccessGate {
    state: watch::Receiver<SessionState>,
}

impl AccessGate {
    pub fn new(state: watch::Receiver<SessionState>) -> Self {
        Self { state }
    }

    pub fn evaluate(state: &SessionState) -> GateDecision {
        match state {
            SessionState::Authenticated(session) => GateDecision::Render(session.clone()),
            SessionState::Unauthenticated => GateDecision::Redirect(LOGIN_ROUTE),
        }
    }

    pub fn decide(&self) -> GateDecision {
        Self::evaluate(&self.state.borrow())
    }

    /// Build the protected content only when signed in.
    pub fn guard<T>(&self, content: impl FnOnce(&Session) -> T) -> Gated<T> {
        match &*self.state.borrow() {
            SessionState::Authenticated(session) => Gated::Render(content(session)),
            SessionState::Unauthenticated => Gated::Redirect(LOGIN_ROUTE),
        }
    }

    /// Wait until the session state changes. Returns `false` once the
    /// manager is gone and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Mark the current state as seen, so `changed` waits for the next one.
    pub fn mark_seen(&mut self) {
        self.state.borrow_and_update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_is_pure_over_state() {
        let session = Session::new("ada", "abc").unwrap();
        assert_eq!(
            AccessGate::evaluate(&SessionState::Authenticated(session.clone())),
            GateDecision::Render(session)
        );
        assert_eq!(
            AccessGate::evaluate(&SessionState::Unauthenticated),
            GateDecision::Redirect("/login")
        );
    }

    #[test]
    fn test_guard_builds_content_only_when_signed_in() {
        let (tx, rx) = watch::channel(SessionState::Unauthenticated);
        let gate = AccessGate::new(rx);

        let mut built = false;
        let out = gate.guard(|_| {
            built = true;
        });
        assert_eq!(out, Gated::Redirect(LOGIN_ROUTE));
        assert!(!built);

        tx.send_replace(SessionState::Authenticated(Session::new("ada", "abc").unwrap()));
        let out = gate.guard(|session| format!("Hello, {}", session.username()));
        assert_eq!(out, Gated::Render("Hello, ada".to_string()));
    }

    #[tokio::test]
    async fn test_gate_re_evaluates_on_change() {
        let (tx, rx) = watch::channel(SessionState::Authenticated(
            Session::new("ada", "abc").unwrap(),
        ));
        let mut gate = AccessGate::new(rx);
        gate.mark_seen();
        assert!(matches!(gate.decide(), GateDecision::Render(_)));

        tx.send_replace(SessionState::Unauthenticated);
        assert!(gate.changed().await);
        assert_eq!(gate.decide(), GateDecision::Redirect(LOGIN_ROUTE));

        drop(tx);
        assert!(!gate.changed().await);
    }
}
