//! API client for the KerjayaFlow backend.
//!
//! `ApiClient` talks to the identity endpoint (`/login`, `/register`) and to
//! the resume services. Service responses are returned as `serde_json::Value`;
//! their shape belongs to the pages that render them.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::{IdentityGrant, IdentityProvider};

// ============================================================================
// Constants
// ============================================================================

/// Default backend location (the development server)
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

/// HTTP request timeout in seconds.
/// Resume analysis can take a while on large PDFs.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Multipart field name the resume services expect
const RESUME_FIELD: &str = "resume";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    username: String,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, ApiError> {
        serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", what, e)))
    }

    // ===== Identity Endpoint =====

    /// Exchange username and password for a bearer credential.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<IdentityGrant, ApiError> {
        let url = self.url("login");
        debug!(username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            warn!(%status, username, "Login rejected");
            return Err(ApiError::from_login_failure(status, &body));
        }

        let login: LoginResponse = Self::decode(&body, "login response")?;
        if login.token.is_empty() || login.username.is_empty() {
            return Err(ApiError::InvalidResponse(
                "login response missing token or username".to_string(),
            ));
        }

        Ok(IdentityGrant {
            username: login.username,
            token: login.token,
        })
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("register"))
            .json(&RegisterRequest {
                username,
                email,
                password,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_login_failure(status, &body));
        }

        let registered: RegisterResponse = Self::decode(&body, "register response")?;
        Ok(registered
            .message
            .unwrap_or_else(|| "Registration successful".to_string()))
    }

    // ===== Resume Services =====

    async fn check_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Self::decode(&body, "service response")
        } else {
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn upload(&self, path: &str, file: &Path) -> Result<Value, ApiError> {
        let bytes = std::fs::read(file)?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume.pdf".to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part(RESUME_FIELD, part);

        let response = self
            .client
            .post(self.url(path))
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await?;
        Self::check_response(response).await
    }

    /// The signed-in user's profile and resume history.
    pub async fn fetch_profile(&self) -> Result<Value, ApiError> {
        self.get("profile").await
    }

    /// Resume health check. Works anonymously; results are kept in the
    /// user's history when a token is set.
    pub async fn analyze_resume(&self, file: &Path) -> Result<Value, ApiError> {
        self.upload("analyze", file).await
    }

    pub async fn ats_scan(&self, file: &Path) -> Result<Value, ApiError> {
        self.upload("ats-scan", file).await
    }

    /// Re-run the ATS scan on a resume already in the user's history.
    pub async fn ats_rescan(&self, resume_id: u64) -> Result<Value, ApiError> {
        self.post_empty(&format!("ats-rescan/{}", resume_id)).await
    }

    pub async fn match_internships(&self, resume_id: u64) -> Result<Value, ApiError> {
        self.get(&format!("internship-match/{}", resume_id)).await
    }
}

#[async_trait]
impl IdentityProvider for ApiClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<IdentityGrant, ApiError> {
        ApiClient::authenticate(self, username, password).await
    }
}
