//! Application state management for the KerjayaFlow terminal client.
//!
//! This module contains the `App` struct: the login and registration form,
//! the current tab, page data, and the background task plumbing. All session
//! state lives in the `SessionManager`; the app only reads it through the
//! `AccessGate`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use kerjaya_core::{
    AccessGate, ActivityBus, ActivityEvent, ApiClient, ApiError, Config, FileStorage,
    IdentityProvider, Session, SessionError, SessionManager, SessionNotice, SessionStore,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for email input (RFC 5321 path limit).
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for a resume file path.
const MAX_PATH_LENGTH: usize = 1024;

/// Shown when the idle countdown signs the user out
pub const EXPIRED_MESSAGE: &str = "Session expired due to inactivity.";

/// Shown after an account is created
pub const REGISTERED_MESSAGE: &str = "Registration Successful! Please Login.";

const CONNECT_ERROR: &str = "Cannot connect to server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    /// Typing the path of a resume to upload to the given tool
    EnteringPath(ToolKind),
    ConfirmingQuit,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Profile,
    Results,
}

/// Which form the signed-out view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Username,
    /// Only part of the form in register mode
    Email,
    Password,
    Button,
    /// Link to the other form
    Switch,
}

/// The resume services offered once signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    HealthCheck,
    AtsScan,
    AtsRescan,
    InternshipMatch,
}

impl ToolKind {
    pub fn label(self) -> &'static str {
        match self {
            ToolKind::HealthCheck => "Resume Health Check",
            ToolKind::AtsScan | ToolKind::AtsRescan => "ATS Robot Check",
            ToolKind::InternshipMatch => "Internship Finder",
        }
    }
}

/// A resume service call: a fresh upload or a resume already in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    HealthCheck(PathBuf),
    AtsScan(PathBuf),
    AtsRescan(u64),
    InternshipMatch(u64),
}

impl ToolRequest {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::HealthCheck(_) => ToolKind::HealthCheck,
            ToolRequest::AtsScan(_) => ToolKind::AtsScan,
            ToolRequest::AtsRescan(_) => ToolKind::AtsRescan,
            ToolRequest::InternshipMatch(_) => ToolKind::InternshipMatch,
        }
    }

    async fn send(self, client: &ApiClient) -> Result<Value, ApiError> {
        match self {
            ToolRequest::HealthCheck(path) => client.analyze_resume(&path).await,
            ToolRequest::AtsScan(path) => client.ats_scan(&path).await,
            ToolRequest::AtsRescan(id) => client.ats_rescan(id).await,
            ToolRequest::InternshipMatch(id) => client.match_internships(id).await,
        }
    }
}

/// The last service result, shown on the Results tab
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ToolKind,
    pub data: Value,
}

/// Messages from spawned tasks back to the UI loop. Page loads carry the
/// username they were requested for so results for a previous user are
/// dropped.
pub enum BackgroundResult {
    LoginFinished(Result<Session, SessionError>),
    RegisterFinished(Result<String, ApiError>),
    ProfileLoaded {
        username: String,
        result: Result<Value, ApiError>,
    },
    ToolFinished {
        username: String,
        kind: ToolKind,
        result: Result<Value, ApiError>,
    },
}

pub struct App {
    // Core services
    pub config: Config,
    config_file: Option<PathBuf>,
    pub session: SessionManager,
    pub api: ApiClient,
    pub gate: AccessGate,
    activity: ActivityBus,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub status_message: Option<String>,

    // Login / register form
    pub auth_mode: AuthMode,
    pub login_username: String,
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_pending: bool,

    // Profile page
    pub profile: Option<Value>,
    pub profile_error: Option<String>,
    pub profile_loading: bool,
    pub selected_resume: usize,

    // Resume tools
    pub path_input: String,
    pub report: Option<Report>,
    pub report_error: Option<String>,
    pub tool_pending: bool,

    background_tx: mpsc::Sender<BackgroundResult>,
}

impl App {
    /// Build the app over the on-disk session store and the configured
    /// backend, and restore any saved session. Returns the receiving end of
    /// the background channel for the main loop to poll.
    pub fn new(config: Config) -> Result<(Self, mpsc::Receiver<BackgroundResult>)> {
        let session_dir = config.session_dir()?;
        debug!(dir = %session_dir.display(), "Session directory configured");

        let store = SessionStore::new(Arc::new(FileStorage::new(session_dir)));
        let api = ApiClient::new(config.api_base_url.clone())
            .context("Failed to build HTTP client")?;
        let config_file = Config::config_path()?;

        let (mut app, rx) = Self::with_services(config, store, Arc::new(api.clone()), api);
        app.config_file = Some(config_file);
        if let Ok(username) = std::env::var("KERJAYA_USERNAME") {
            app.prefill_username(username);
        }
        Ok((app, rx))
    }

    /// Build the app over explicit services. The config is kept in memory
    /// only.
    pub fn with_services(
        config: Config,
        store: SessionStore,
        identity: Arc<dyn IdentityProvider>,
        api: ApiClient,
    ) -> (Self, mpsc::Receiver<BackgroundResult>) {
        let activity = ActivityBus::new();
        let session = SessionManager::new(store, identity, activity.clone(), config.idle_timeout());

        if session.restore() {
            info!("Resuming saved session");
        }
        let gate = AccessGate::new(session.subscribe());

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let login_username = config.last_username.clone().unwrap_or_default();

        let mut app = Self {
            config,
            config_file: None,
            session,
            api,
            gate,
            activity,

            state: AppState::Normal,
            current_tab: Tab::Dashboard,
            status_message: None,

            auth_mode: AuthMode::Login,
            login_username: String::new(),
            login_email: String::new(),
            login_password: String::new(),
            login_focus: LoginFocus::Username,
            login_error: None,
            login_pending: false,

            profile: None,
            profile_error: None,
            profile_loading: false,
            selected_resume: 0,

            path_input: String::new(),
            report: None,
            report_error: None,
            tool_pending: false,

            background_tx: tx,
        };
        app.prefill_username(login_username);
        (app, rx)
    }

    fn prefill_username(&mut self, username: String) {
        self.login_username = username;
        self.login_focus = self.first_empty_field();
    }

    fn first_empty_field(&self) -> LoginFocus {
        if self.login_username.is_empty() {
            LoginFocus::Username
        } else if self.auth_mode == AuthMode::Register && self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    fn current_username(&self) -> Option<String> {
        self.session.session().map(|s| s.username().to_string())
    }

    /// Forward user input to the idle countdown.
    pub fn record_activity(&self, event: ActivityEvent) {
        self.activity.publish(event);
    }

    /// Helper to send background results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if tx.send(result).await.is_err() {
            error!("Failed to send background result - channel closed");
        }
    }

    // ===== Login / Register =====

    /// Submit the login form. Ignored while an attempt is already in flight.
    pub fn submit_login(&mut self) {
        if self.login_pending {
            return;
        }
        if self.login_username.trim().is_empty() || self.login_password.is_empty() {
            self.login_error = Some(SessionError::MissingCredentials.user_message());
            return;
        }

        self.login_error = None;
        self.login_pending = true;

        let session = self.session.clone();
        let tx = self.background_tx.clone();
        let username = self.login_username.clone();
        let password = std::mem::take(&mut self.login_password);

        tokio::spawn(async move {
            let result = session.login(&username, &password).await;
            Self::send_result(&tx, BackgroundResult::LoginFinished(result)).await;
        });
    }

    /// Submit the registration form. Shares the pending flag with login.
    pub fn submit_register(&mut self) {
        if self.login_pending {
            return;
        }
        if self.login_username.trim().is_empty()
            || self.login_email.trim().is_empty()
            || self.login_password.is_empty()
        {
            self.login_error = Some("Please fill in all fields.".to_string());
            return;
        }

        self.login_error = None;
        self.login_pending = true;

        let api = self.api.clone();
        let tx = self.background_tx.clone();
        let username = self.login_username.trim().to_string();
        let email = self.login_email.trim().to_string();
        let password = std::mem::take(&mut self.login_password);

        tokio::spawn(async move {
            let result = api.register(&username, &email, &password).await;
            Self::send_result(&tx, BackgroundResult::RegisterFinished(result)).await;
        });
    }

    /// Submit whichever form is showing
    pub fn submit_form(&mut self) {
        match self.auth_mode {
            AuthMode::Login => self.submit_login(),
            AuthMode::Register => self.submit_register(),
        }
    }

    /// Flip between the login and registration forms.
    pub fn toggle_auth_mode(&mut self) {
        self.auth_mode = match self.auth_mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.login_error = None;
        self.login_password.clear();
        self.login_focus = self.first_empty_field();
    }

    /// Form fields in tab order for the current mode
    pub fn form_fields(&self) -> &'static [LoginFocus] {
        match self.auth_mode {
            AuthMode::Login => &[
                LoginFocus::Username,
                LoginFocus::Password,
                LoginFocus::Button,
                LoginFocus::Switch,
            ],
            AuthMode::Register => &[
                LoginFocus::Username,
                LoginFocus::Email,
                LoginFocus::Password,
                LoginFocus::Button,
                LoginFocus::Switch,
            ],
        }
    }

    /// Move focus through the form, wrapping at either end.
    pub fn cycle_focus(&mut self, forward: bool) {
        let fields = self.form_fields();
        let current = fields
            .iter()
            .position(|f| *f == self.login_focus)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % fields.len()
        } else {
            (current + fields.len() - 1) % fields.len()
        };
        self.login_focus = fields[next];
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.clear_pages();
        self.current_tab = Tab::Dashboard;
    }

    // ===== Pages =====

    /// Load the profile page with the current credential.
    pub fn fetch_profile(&mut self) {
        let Some(username) = self.current_username() else {
            return;
        };
        if self.profile_loading {
            return;
        }
        self.profile_loading = true;
        self.profile_error = None;

        let client = self.session.authorize(&self.api);
        let tx = self.background_tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_profile().await;
            Self::send_result(&tx, BackgroundResult::ProfileLoaded { username, result }).await;
        });
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        self.current_tab = tab;
        if tab == Tab::Profile && self.profile.is_none() {
            self.fetch_profile();
        }
    }

    /// Ids of the resumes in the loaded profile, newest first as served
    pub fn resume_ids(&self) -> Vec<u64> {
        self.profile
            .as_ref()
            .and_then(|p| p.get("resumes"))
            .and_then(Value::as_array)
            .map(|resumes| {
                resumes
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_u64))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn selected_resume_id(&self) -> Option<u64> {
        self.resume_ids().get(self.selected_resume).copied()
    }

    pub fn move_resume_selection(&mut self, down: bool) {
        let count = self.resume_ids().len();
        if count == 0 {
            self.selected_resume = 0;
            return;
        }
        self.selected_resume = if down {
            (self.selected_resume + 1).min(count - 1)
        } else {
            self.selected_resume.saturating_sub(1)
        };
    }

    // ===== Resume Tools =====

    /// Open the path prompt for an upload tool
    pub fn begin_upload(&mut self, kind: ToolKind) {
        if matches!(kind, ToolKind::HealthCheck | ToolKind::AtsScan) {
            self.report_error = None;
            self.state = AppState::EnteringPath(kind);
        }
    }

    /// Submit the path prompt. An empty path just closes it.
    pub fn submit_path(&mut self) {
        let AppState::EnteringPath(kind) = self.state else {
            return;
        };
        self.state = AppState::Normal;

        let path = self.path_input.trim();
        if path.is_empty() {
            return;
        }
        let path = PathBuf::from(path);
        match kind {
            ToolKind::HealthCheck => self.run_tool(ToolRequest::HealthCheck(path)),
            ToolKind::AtsScan => self.run_tool(ToolRequest::AtsScan(path)),
            ToolKind::AtsRescan | ToolKind::InternshipMatch => {}
        }
    }

    /// Run a service against the selected resume in the profile list.
    pub fn run_on_selected(&mut self, kind: ToolKind) {
        let Some(id) = self.selected_resume_id() else {
            self.report_error = Some("No resumes found. Please upload one first.".to_string());
            return;
        };
        match kind {
            ToolKind::AtsRescan => self.run_tool(ToolRequest::AtsRescan(id)),
            ToolKind::InternshipMatch => self.run_tool(ToolRequest::InternshipMatch(id)),
            ToolKind::HealthCheck | ToolKind::AtsScan => {}
        }
    }

    /// Call a resume service with the current credential. One call at a
    /// time; ignored when signed out.
    pub fn run_tool(&mut self, request: ToolRequest) {
        let Some(username) = self.current_username() else {
            return;
        };
        if self.tool_pending {
            return;
        }
        self.tool_pending = true;
        self.report_error = None;

        let kind = request.kind();
        debug!(?kind, "Running resume tool");
        let client = self.session.authorize(&self.api);
        let tx = self.background_tx.clone();
        tokio::spawn(async move {
            let result = request.send(&client).await;
            Self::send_result(&tx, BackgroundResult::ToolFinished { username, kind, result })
                .await;
        });
    }

    // ===== Background Results =====

    /// Apply a finished background task
    pub fn apply_background(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::LoginFinished(result) => {
                self.login_pending = false;
                match result {
                    Ok(session) => {
                        self.login_error = None;
                        self.status_message = None;
                        self.current_tab = Tab::Dashboard;
                        self.config.last_username = Some(session.username().to_string());
                        self.save_config();
                    }
                    Err(SessionError::StaleResponse) => {
                        debug!("Dropped superseded login result");
                    }
                    Err(e) => {
                        self.login_error = Some(e.user_message());
                    }
                }
            }
            BackgroundResult::RegisterFinished(result) => {
                self.login_pending = false;
                match result {
                    Ok(message) => {
                        info!(%message, "Account registered");
                        self.login_email.clear();
                        self.auth_mode = AuthMode::Login;
                        self.login_error = None;
                        self.login_focus = self.first_empty_field();
                        self.status_message = Some(REGISTERED_MESSAGE.to_string());
                    }
                    Err(e) => {
                        warn!(error = %e, "Registration failed");
                        self.login_error = Some(Self::service_message(&e));
                    }
                }
            }
            BackgroundResult::ProfileLoaded { username, result } => {
                self.profile_loading = false;
                if self.current_username().as_deref() != Some(username.as_str()) {
                    debug!(%username, "Dropping profile for a session that has ended");
                    return;
                }
                match result {
                    Ok(profile) => {
                        self.profile = Some(profile);
                        let count = self.resume_ids().len();
                        self.selected_resume = self.selected_resume.min(count.saturating_sub(1));
                    }
                    Err(ApiError::Network(_)) => {
                        self.profile_error = Some(CONNECT_ERROR.to_string());
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to load profile");
                        self.profile_error = Some(format!("Session error: {}", e));
                    }
                }
            }
            BackgroundResult::ToolFinished {
                username,
                kind,
                result,
            } => {
                self.tool_pending = false;
                if self.current_username().as_deref() != Some(username.as_str()) {
                    debug!(%username, "Dropping tool result for a session that has ended");
                    return;
                }
                match result {
                    Ok(data) => {
                        self.report = Some(Report { kind, data });
                        self.current_tab = Tab::Results;
                        // Uploads land in the history; reload it on next visit
                        if matches!(kind, ToolKind::HealthCheck | ToolKind::AtsScan) {
                            self.profile = None;
                        }
                    }
                    Err(e) => {
                        warn!(?kind, error = %e, "Resume tool failed");
                        self.report_error = Some(format!("{}: {}", kind.label(), Self::service_message(&e)));
                    }
                }
            }
        }
    }

    fn service_message(e: &ApiError) -> String {
        match e {
            ApiError::Network(_) => CONNECT_ERROR.to_string(),
            other => other.to_string(),
        }
    }

    fn save_config(&self) {
        if let Some(ref path) = self.config_file {
            if let Err(e) = self.config.save_to(path) {
                warn!(error = %e, "Failed to save config");
            }
        }
    }

    /// React to a session transition published by the manager
    pub fn on_notice(&mut self, notice: SessionNotice) {
        match notice {
            SessionNotice::Expired => {
                self.status_message = Some(EXPIRED_MESSAGE.to_string());
                self.clear_pages();
            }
            SessionNotice::LoggedOut => self.clear_pages(),
            SessionNotice::LoggedIn => {}
        }
    }

    fn clear_pages(&mut self) {
        self.profile = None;
        self.profile_error = None;
        self.selected_resume = 0;
        self.report = None;
        self.report_error = None;
        self.path_input.clear();
        if matches!(self.state, AppState::EnteringPath(_)) {
            self.state = AppState::Normal;
        }
        self.current_tab = Tab::Dashboard;
        self.login_focus = self.first_empty_field();
    }

    /// Release the idle countdown before exit; the saved session is kept.
    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_path_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PATH_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kerjaya_core::{IdentityGrant, MemoryStorage, Storage};

    /// Grants every login for the username it was asked about
    #[derive(Default)]
    struct CountingIdentity {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for CountingIdentity {
        async fn authenticate(
            &self,
            username: &str,
            _password: &str,
        ) -> Result<IdentityGrant, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(IdentityGrant {
                username: username.to_string(),
                token: format!("token-{}", username),
            })
        }
    }

    struct Harness {
        app: App,
        rx: mpsc::Receiver<BackgroundResult>,
        storage: Arc<MemoryStorage>,
        identity: Arc<CountingIdentity>,
    }

    fn harness_with(storage: Arc<MemoryStorage>) -> Harness {
        let identity = Arc::new(CountingIdentity::default());
        // Nothing listens on port 1, so any real request fails fast
        let api = ApiClient::new("http://127.0.0.1:1").unwrap();
        let (app, rx) = App::with_services(
            Config::default(),
            SessionStore::new(storage.clone()),
            identity.clone(),
            api,
        );
        Harness {
            app,
            rx,
            storage,
            identity,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryStorage::new()))
    }

    async fn login(h: &mut Harness, username: &str) {
        h.app.login_username = username.to_string();
        h.app.login_password = "pw".to_string();
        h.app.submit_login();
        let result = h.rx.recv().await.unwrap();
        h.app.apply_background(result);
        assert!(h.app.is_authenticated());
    }

    #[test]
    fn test_can_add_username_char() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(49, 'z'));
        assert!(!can_add_username_char(50, 'a'));
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_can_add_email_and_path_chars() {
        assert!(can_add_email_char(0, '@'));
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(254, 'a'));
        assert!(can_add_path_char(0, ' '));
        assert!(!can_add_path_char(1024, 'a'));
    }

    #[tokio::test]
    async fn test_starts_signed_in_from_saved_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("token", "abc").unwrap();
        storage.set_item("user", r#"{"username":"ada"}"#).unwrap();

        let h = harness_with(storage);
        assert!(h.app.is_authenticated());
        assert_eq!(h.app.session.bearer().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_login_through_form() {
        let mut h = harness();
        login(&mut h, "ada").await;

        assert!(!h.app.login_pending);
        assert!(h.app.login_password.is_empty());
        assert_eq!(h.app.config.last_username.as_deref(), Some("ada"));
        assert!(!h.storage.is_empty());
    }

    #[tokio::test]
    async fn test_submit_login_ignored_while_pending() {
        let mut h = harness();
        h.app.login_username = "ada".to_string();
        h.app.login_password = "pw".to_string();
        h.app.login_pending = true;

        h.app.submit_login();

        assert_eq!(h.app.login_password, "pw");
        assert!(h.rx.try_recv().is_err());
        assert_eq!(h.identity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_login_requires_both_fields() {
        let mut h = harness();
        h.app.login_username = "ada".to_string();

        h.app.submit_login();

        assert_eq!(
            h.app.login_error.as_deref(),
            Some("Username and password required")
        );
        assert!(!h.app.login_pending);
    }

    #[tokio::test]
    async fn test_stale_login_result_is_silent() {
        let mut h = harness();
        h.app.login_pending = true;

        h.app
            .apply_background(BackgroundResult::LoginFinished(Err(SessionError::StaleResponse)));

        assert!(!h.app.login_pending);
        assert!(h.app.login_error.is_none());
    }

    #[tokio::test]
    async fn test_rejected_login_shows_server_message() {
        let mut h = harness();
        h.app.login_pending = true;

        h.app.apply_background(BackgroundResult::LoginFinished(Err(
            SessionError::Credential("Invalid credentials".to_string()),
        )));

        assert_eq!(h.app.login_error.as_deref(), Some("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_expiry_notice_explains_and_clears_pages() {
        let mut h = harness();
        h.app.profile = Some(serde_json::json!({"username": "ada"}));
        h.app.report = Some(Report {
            kind: ToolKind::HealthCheck,
            data: serde_json::json!({"score": 80}),
        });
        h.app.current_tab = Tab::Results;

        h.app.on_notice(SessionNotice::Expired);

        assert_eq!(h.app.status_message.as_deref(), Some(EXPIRED_MESSAGE));
        assert!(h.app.profile.is_none());
        assert!(h.app.report.is_none());
        assert_eq!(h.app.current_tab, Tab::Dashboard);
    }

    #[tokio::test]
    async fn test_logout_notice_is_silent() {
        let mut h = harness();
        h.app.profile = Some(serde_json::json!({"username": "ada"}));

        h.app.on_notice(SessionNotice::LoggedOut);

        assert!(h.app.status_message.is_none());
        assert!(h.app.profile.is_none());
    }

    #[tokio::test]
    async fn test_profile_for_previous_user_is_dropped() {
        let mut h = harness();
        login(&mut h, "grace").await;
        h.app.profile_loading = true;

        h.app.apply_background(BackgroundResult::ProfileLoaded {
            username: "ada".to_string(),
            result: Ok(serde_json::json!({"username": "ada", "resumes": []})),
        });

        assert!(!h.app.profile_loading);
        assert!(h.app.profile.is_none());
    }

    #[tokio::test]
    async fn test_profile_for_current_user_is_shown() {
        let mut h = harness();
        login(&mut h, "ada").await;

        h.app.apply_background(BackgroundResult::ProfileLoaded {
            username: "ada".to_string(),
            result: Ok(serde_json::json!({"resumes": [{"id": 4}, {"id": 9}]})),
        });

        assert_eq!(h.app.resume_ids(), vec![4, 9]);
        h.app.move_resume_selection(true);
        h.app.move_resume_selection(true);
        assert_eq!(h.app.selected_resume_id(), Some(9));
        h.app.move_resume_selection(false);
        assert_eq!(h.app.selected_resume_id(), Some(4));
    }

    #[tokio::test]
    async fn test_tool_result_for_previous_user_is_dropped() {
        let mut h = harness();
        login(&mut h, "grace").await;
        h.app.tool_pending = true;

        h.app.apply_background(BackgroundResult::ToolFinished {
            username: "ada".to_string(),
            kind: ToolKind::InternshipMatch,
            result: Ok(serde_json::json!({"matches": []})),
        });

        assert!(!h.app.tool_pending);
        assert!(h.app.report.is_none());
    }

    #[tokio::test]
    async fn test_tool_result_opens_results_tab() {
        let mut h = harness();
        login(&mut h, "ada").await;
        h.app.profile = Some(serde_json::json!({"resumes": []}));

        h.app.apply_background(BackgroundResult::ToolFinished {
            username: "ada".to_string(),
            kind: ToolKind::HealthCheck,
            result: Ok(serde_json::json!({"score": 75, "present": [], "missing": []})),
        });

        assert_eq!(h.app.current_tab, Tab::Results);
        assert_eq!(h.app.report.as_ref().map(|r| r.kind), Some(ToolKind::HealthCheck));
        // The upload is now part of the history
        assert!(h.app.profile.is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_reported_with_tool_name() {
        let mut h = harness();
        login(&mut h, "ada").await;

        h.app.run_tool(ToolRequest::AtsRescan(4));
        assert!(h.app.tool_pending);
        let result = h.rx.recv().await.unwrap();
        h.app.apply_background(result);

        assert!(!h.app.tool_pending);
        assert_eq!(
            h.app.report_error.as_deref(),
            Some("ATS Robot Check: Cannot connect to server.")
        );
    }

    #[tokio::test]
    async fn test_tools_need_a_session() {
        let mut h = harness();

        h.app.run_tool(ToolRequest::InternshipMatch(4));

        assert!(!h.app.tool_pending);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_on_selected_without_resumes() {
        let mut h = harness();
        login(&mut h, "ada").await;

        h.app.run_on_selected(ToolKind::InternshipMatch);

        assert!(!h.app.tool_pending);
        assert!(h.app.report_error.is_some());
    }

    #[tokio::test]
    async fn test_path_prompt_submits_upload() {
        let mut h = harness();
        login(&mut h, "ada").await;

        h.app.begin_upload(ToolKind::AtsScan);
        assert_eq!(h.app.state, AppState::EnteringPath(ToolKind::AtsScan));
        h.app.path_input = "/nonexistent/kerjaya/cv.pdf".to_string();
        h.app.submit_path();

        assert_eq!(h.app.state, AppState::Normal);
        assert!(h.app.tool_pending);
        let result = h.rx.recv().await.unwrap();
        assert!(matches!(
            result,
            BackgroundResult::ToolFinished {
                kind: ToolKind::AtsScan,
                result: Err(ApiError::Upload(_)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_register_form_cycle_and_result() {
        let mut h = harness();
        h.app.toggle_auth_mode();
        assert_eq!(h.app.auth_mode, AuthMode::Register);
        assert_eq!(h.app.login_focus, LoginFocus::Username);

        h.app.cycle_focus(true);
        assert_eq!(h.app.login_focus, LoginFocus::Email);
        h.app.cycle_focus(false);
        h.app.cycle_focus(false);
        assert_eq!(h.app.login_focus, LoginFocus::Switch);

        h.app.login_username = "ada".to_string();
        h.app.submit_form();
        assert_eq!(h.app.login_error.as_deref(), Some("Please fill in all fields."));

        h.app.login_pending = true;
        h.app
            .apply_background(BackgroundResult::RegisterFinished(Ok("User created".to_string())));
        assert!(!h.app.login_pending);
        assert_eq!(h.app.auth_mode, AuthMode::Login);
        assert_eq!(h.app.login_focus, LoginFocus::Password);
        assert_eq!(h.app.status_message.as_deref(), Some(REGISTERED_MESSAGE));
    }

    #[tokio::test]
    async fn test_register_rejection_shows_server_message() {
        let mut h = harness();
        h.app.toggle_auth_mode();
        h.app.login_pending = true;

        h.app.apply_background(BackgroundResult::RegisterFinished(Err(ApiError::Credential(
            "Username already exists".to_string(),
        ))));

        assert_eq!(h.app.auth_mode, AuthMode::Register);
        assert_eq!(h.app.login_error.as_deref(), Some("Username already exists"));
    }
}
