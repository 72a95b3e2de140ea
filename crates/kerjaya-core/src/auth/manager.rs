//! The session state machine.
//!
//! `SessionManager` is the only thing that mutates the current session. It
//! keeps three things convergent: the in-memory state published to consumers,
//! the durable copy in `SessionStore`, and the `InactivityMonitor` countdown
//! that exists exactly while a session is authenticated.
//!
//! ```text
//!              restore() / login()
//!  [Unauthenticated] ───────────────→ [Authenticated]
//!          ↑                                │
//!          └──── logout() / idle expiry ────┘
//! ```
//!
//! Login responses are matched against a request generation. `login`,
//! `logout` and expiry all advance it, so a reply that arrives after the
//! session moved on is dropped instead of applied.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::{ActivityBus, InactivityMonitor, Session, SessionError, SessionStore};
use crate::api::{ApiClient, ApiError};

/// Buffered notices per subscriber
const NOTICE_BUFFER_SIZE: usize = 16;

/// A successful answer from the identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityGrant {
    pub username: String,
    pub token: String,
}

/// Issues bearer credentials for a username and password.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<IdentityGrant, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated(Session),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            SessionState::Unauthenticated => None,
        }
    }
}

/// User-visible transitions. `Expired` is distinct from a voluntary logout so
/// the front end can tell the user why they were signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    LoggedIn,
    LoggedOut,
    Expired,
}

/// Whether the current session reached the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Durable,
    /// The store rejected the write; the session lasts until restart only.
    InMemoryOnly,
}

/// Handle to the session state machine. Clone is cheap and every clone
/// drives the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: SessionStore,
    identity: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
    notices: broadcast::Sender<SessionNotice>,
    core: Mutex<Core>,
}

struct Core {
    monitor: InactivityMonitor,
    /// Advanced by every login attempt, logout and expiry
    request_generation: u64,
    /// Advanced on every transition; an expiry callback only applies to the
    /// epoch it was armed in
    epoch: u64,
    persistence: Persistence,
    /// Set by `shutdown`; nothing is established afterwards
    shut_down: bool,
}

impl SessionManager {
    pub fn new(
        store: SessionStore,
        identity: Arc<dyn IdentityProvider>,
        activity: ActivityBus,
        idle_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        let (notices, _) = broadcast::channel(NOTICE_BUFFER_SIZE);

        Self {
            inner: Arc::new(Inner {
                store,
                identity,
                state,
                notices,
                core: Mutex::new(Core {
                    monitor: InactivityMonitor::new(activity, idle_timeout),
                    request_generation: 0,
                    epoch: 0,
                    persistence: Persistence::Durable,
                    shut_down: false,
                }),
            }),
        }
    }

    /// Pick up a session persisted by a previous run. Returns whether the
    /// manager is now authenticated.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn restore(&self) -> bool {
        let mut core = self.inner.lock();
        if core.shut_down {
            return false;
        }
        if self.inner.state.borrow().is_authenticated() {
            return true;
        }

        match self.inner.store.load() {
            Some(session) => {
                info!(username = %session.username(), "Restored saved session");
                core.persistence = Persistence::Durable;
                self.inner.establish(&mut core, session);
                true
            }
            None => {
                debug!("No saved session");
                false
            }
        }
    }

    /// Authenticate against the identity endpoint and, on success, replace
    /// the current session with the new one.
    ///
    /// A failed attempt leaves state and store untouched. If another login,
    /// a logout, or an expiry happens while this request is in flight, its
    /// response is discarded with `SessionError::StaleResponse`.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        let generation = {
            let mut core = self.inner.lock();
            core.request_generation += 1;
            core.request_generation
        };
        debug!(username, generation, "Login request started");

        let result = self.inner.identity.authenticate(username, password).await;

        let session = {
            let mut core = self.inner.lock();
            if core.shut_down || core.request_generation != generation {
                debug!(username, generation, current = core.request_generation, "Discarding stale login response");
                return Err(SessionError::StaleResponse);
            }

            let grant = result.map_err(|e| {
                warn!(username, error = %e, "Login failed");
                SessionError::from(e)
            })?;
            let session = Session::new(grant.username, grant.token).ok_or_else(|| {
                SessionError::Credential("Login response missing token or username".to_string())
            })?;

            core.persistence = match self.inner.store.save(&session) {
                Ok(()) => Persistence::Durable,
                Err(e) => {
                    warn!(error = %e, "Session storage unavailable, keeping session in memory only");
                    Persistence::InMemoryOnly
                }
            };
            self.inner.establish(&mut core, session.clone());
            session
        };

        info!(username = %session.username(), "Login successful");
        let _ = self.inner.notices.send(SessionNotice::LoggedIn);
        Ok(session)
    }

    /// End the session from either state. Idempotent; only an actual
    /// transition emits `SessionNotice::LoggedOut`.
    pub fn logout(&self) {
        let was_authenticated = {
            let mut core = self.inner.lock();
            core.request_generation += 1;
            self.inner.teardown(&mut core)
        };

        if was_authenticated {
            info!("Logged out");
            let _ = self.inner.notices.send(SessionNotice::LoggedOut);
        }
    }

    /// Release the countdown without touching the stored session, for when
    /// the front end is closing. A login still in flight is discarded and
    /// this manager establishes nothing afterwards; the next run's `restore`
    /// picks the stored session up again.
    pub fn shutdown(&self) {
        let mut core = self.inner.lock();
        core.request_generation += 1;
        core.shut_down = true;
        core.monitor.stop();
        debug!("Session manager shut down");
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Watch the current state. The receiver observes each transition before
    /// the matching notice is sent.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.inner.notices.subscribe()
    }

    pub fn persistence(&self) -> Persistence {
        self.inner.lock().persistence
    }

    /// True while an idle countdown is pending.
    pub fn is_monitoring(&self) -> bool {
        self.inner.lock().monitor.is_running()
    }

    /// The current bearer credential, if authenticated.
    pub fn bearer(&self) -> Option<String> {
        self.session().map(|s| s.credential().to_string())
    }

    /// A copy of `client` carrying the current credential, or none at all
    /// when signed out.
    pub fn authorize(&self, client: &ApiClient) -> ApiClient {
        match self.bearer() {
            Some(token) => client.with_token(token),
            None => {
                let mut anonymous = client.clone();
                anonymous.clear_token();
                anonymous
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        // Core holds no invariants a panicking holder could break halfway
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enter `Authenticated` with `session`, arming a fresh countdown.
    fn establish(self: &Arc<Self>, core: &mut Core, session: Session) {
        if core.shut_down {
            return;
        }
        core.epoch += 1;
        let epoch = core.epoch;
        let weak = Arc::downgrade(self);
        core.monitor.start(move || {
            if let Some(inner) = weak.upgrade() {
                inner.expire(epoch);
            }
        });
        self.state.send_replace(SessionState::Authenticated(session));
    }

    /// Leave `Authenticated`: stop the countdown, clear the store, publish
    /// the empty state. Returns whether a session was actually ended.
    fn teardown(&self, core: &mut Core) -> bool {
        core.monitor.stop();
        core.persistence = Persistence::Durable;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }

        let was_authenticated = self.state.borrow().is_authenticated();
        if was_authenticated {
            core.epoch += 1;
            self.state.send_replace(SessionState::Unauthenticated);
        }
        was_authenticated
    }

    fn expire(&self, epoch: u64) {
        let expired = {
            let mut core = self.lock();
            if core.epoch != epoch {
                debug!(epoch, current = core.epoch, "Ignoring expiry for an ended session");
                return;
            }
            core.request_generation += 1;
            self.teardown(&mut core)
        };

        if expired {
            info!("Session expired due to inactivity");
            let _ = self.notices.send(SessionNotice::Expired);
        }
    }
}
