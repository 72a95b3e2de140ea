use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Storage, StorageError};

/// Storage key holding the raw credential
const TOKEN_KEY: &str = "token";

/// Storage key holding the JSON-encoded user object
const USER_KEY: &str = "user";

/// An authenticated identity. Both fields are always non-empty; there is no
/// way to build a half-populated session.
#[derive(Clone)]
pub struct Session {
    username: String,
    credential: String,
    issued_at: DateTime<Utc>,
}

impl Session {
    /// Returns `None` if either field is empty.
    pub fn new(username: impl Into<String>, credential: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let credential = credential.into();
        if username.trim().is_empty() || credential.trim().is_empty() {
            return None;
        }
        Some(Self {
            username,
            credential,
            issued_at: Utc::now(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The bearer token
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// When this process acquired the session, by login or restore.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.credential)
    }
}

// issued_at is not persisted, so identity is the (username, credential) pair
impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && self.credential == other.credential
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("credential", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredUser {
    username: String,
}

/// Durable copy of zero or one session, kept under two keys that are always
/// written and cleared together.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Write the full record, replacing any previous one.
    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        let user = serde_json::to_string(&StoredUser {
            username: session.username.clone(),
        })?;

        self.storage.set_item(TOKEN_KEY, &session.credential)?;
        if let Err(e) = self.storage.set_item(USER_KEY, &user) {
            // Never leave a token behind without its user
            if let Err(rollback) = self.storage.remove_item(TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back partial session write");
            }
            return Err(e);
        }

        debug!(username = %session.username, "Session saved");
        Ok(())
    }

    /// Load the persisted session. Missing, empty, or malformed keys all read
    /// as absent.
    pub fn load(&self) -> Option<Session> {
        let token = match self.storage.get_item(TOKEN_KEY) {
            Ok(token) => token?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                return None;
            }
        };
        let user = match self.storage.get_item(USER_KEY) {
            Ok(user) => user?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user");
                return None;
            }
        };

        let user: StoredUser = match serde_json::from_str(&user) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Stored user record is malformed");
                return None;
            }
        };

        let session = Session::new(user.username, token);
        if session.is_none() {
            debug!("Stored session has an empty field");
        }
        session
    }

    /// Remove both keys. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<(), StorageError> {
        let token = self.storage.remove_item(TOKEN_KEY);
        let user = self.storage.remove_item(USER_KEY);
        token.and(user)
    }
}
