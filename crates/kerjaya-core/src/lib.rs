//! Core library for KerjayaFlow.
//!
//! Owns the client-side session lifecycle: acquiring a credential from the
//! identity endpoint, persisting it across restarts, expiring it after
//! inactivity, and gating protected views on its presence.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AccessGate, ActivityBus, ActivityEvent, FileStorage, GateDecision, Gated, IdentityGrant,
    IdentityProvider, InactivityMonitor, MemoryStorage, Persistence, Session, SessionError,
    SessionManager, SessionNotice, SessionState, SessionStore, Storage, StorageError,
};
pub use config::Config;
