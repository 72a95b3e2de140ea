//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `Session`: the all-or-nothing (username, credential) pair
//! - `SessionStore`: durable persistence of one session over a `Storage` medium
//! - `InactivityMonitor`: resettable idle countdown fed by user activity
//! - `SessionManager`: the state machine tying the above to the identity endpoint
//! - `AccessGate`: render-or-redirect decision over the current session
//!
//! Sessions expire after 10 minutes without keyboard or pointer activity.

pub mod error;
pub mod gate;
pub mod manager;
pub mod monitor;
pub mod session;
pub mod storage;

pub use error::{SessionError, StorageError};
pub use gate::{AccessGate, GateDecision, Gated, LOGIN_ROUTE};
pub use manager::{
    IdentityGrant, IdentityProvider, Persistence, SessionManager, SessionNotice, SessionState,
};
pub use monitor::{ActivityBus, ActivityEvent, InactivityMonitor, DEFAULT_IDLE_TIMEOUT};
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, Storage};
