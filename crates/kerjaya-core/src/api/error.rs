use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Structured rejection from the server, message kept verbatim.
    #[error("{0}")]
    Credential(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read upload: {0}")]
    Upload(#[from] std::io::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// The `error` field of a `{"error": "..."}` body, if there is one.
    pub fn error_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error)
    }

    /// Rejection from the identity endpoint: the server's message verbatim,
    /// or the status line when the body carries none.
    pub fn from_login_failure(status: reqwest::StatusCode, body: &str) -> Self {
        match Self::error_message(body) {
            Some(message) => ApiError::Credential(message),
            None => ApiError::Credential(format!("Login failed ({})", status)),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if let Some(message) = Self::error_message(body) {
            if status.is_client_error() && status.as_u16() != 401 {
                return ApiError::Credential(message);
            }
        }
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
