use thiserror::Error;

use crate::api::ApiError;

/// Failure of the persistence medium backing the session store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced by `SessionManager`.
///
/// None of these are fatal: storage failures degrade to an in-memory session,
/// stale responses are dropped, and the rest are shown to the user.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot connect to server: {0}")]
    Network(String),

    #[error("{0}")]
    Credential(String),

    #[error("Session storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Login response arrived after the session changed")]
    StaleResponse,

    #[error("Username and password required")]
    MissingCredentials,
}

impl SessionError {
    /// Text suitable for showing in the login view.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Network(_) => "Cannot connect to server.".to_string(),
            SessionError::Credential(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(e) => SessionError::Network(e.to_string()),
            ApiError::Credential(msg) => SessionError::Credential(msg),
            other => SessionError::Credential(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_user_message_is_generic() {
        let err = SessionError::Network("connection refused (os error 111)".to_string());
        assert_eq!(err.user_message(), "Cannot connect to server.");
    }

    #[test]
    fn test_credential_error_is_verbatim() {
        let err = SessionError::from(ApiError::Credential("Invalid credentials".to_string()));
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn test_invalid_response_maps_to_credential() {
        let err = SessionError::from(ApiError::InvalidResponse("missing token".to_string()));
        assert!(matches!(err, SessionError::Credential(_)));
    }
}
