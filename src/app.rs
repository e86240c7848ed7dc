//! Application state container and orchestration.
//!
//! `App` wires the session manager, API client, and UI state together:
//! the login form, the gate check per frame, and the background data
//! refresh with its refresh-then-retry handling of expired tokens.

use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{gate, AuthError, CredentialStore, GateDecision, Keychain, SessionManager};
use crate::config::Config;
use crate::models::{DashboardSummary, Order};

/// Buffer size for the background refresh channel
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Protected views of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Orders,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    LoggingIn,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Result types from the background refresh task.
enum RefreshResult {
    Summary(DashboardSummary),
    Orders(Vec<Order>),
    /// A data fetch came back 401 - the access token is stale
    Unauthorized,
    Error(String),
    RefreshComplete,
}

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    pub session: SessionManager<ApiClient>,
    pub api: ApiClient,

    // UI state
    pub state: AppState,
    pub current_tab: Tab,
    /// Where the user was headed when the gate redirected them to login
    pub pending_tab: Option<Tab>,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub remember_password: bool,

    // Dashboard data
    pub summary: DashboardSummary,
    pub orders: Vec<Order>,
    pub orders_selection: usize,

    // Background refresh
    refresh_rx: Option<mpsc::Receiver<RefreshResult>>,
    refresh_tx: mpsc::Sender<RefreshResult>,
    pub refreshing: bool,
    /// Set once a silent refresh has been attempted for the current
    /// stale token, so a second 401 falls through to the login screen
    refresh_retry_pending: bool,

    pub status_message: Option<String>,
}

impl App {
    pub fn new() -> Result<Self> {
        debug!("App::new() starting");
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir()?;
        let api = ApiClient::new(config.api_base_url())?;
        let store = CredentialStore::new(cache_dir);
        let session = SessionManager::new(api.clone(), store);

        // Resolve the restoring phase before the first frame
        let restored = session.restore();
        debug!(restored, "Session restore resolved");

        let mut api = api;
        if let Some(token) = session.access_token() {
            api.set_token(token);
        }

        let login_username = std::env::var("SHOPDASH_USERNAME")
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();

        let login_password = std::env::var("SHOPDASH_PASSWORD")
            .ok()
            .or_else(|| {
                if login_username.is_empty() {
                    None
                } else {
                    Keychain::get_password(&login_username).ok()
                }
            })
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut app = Self {
            config,
            session,
            api,

            state: AppState::Normal,
            current_tab: Tab::Dashboard,
            pending_tab: None,

            login_username,
            login_password,
            login_focus: LoginFocus::Username,
            login_error: None,
            remember_password: true,

            summary: DashboardSummary::default(),
            orders: Vec::new(),
            orders_selection: 0,

            refresh_rx: Some(rx),
            refresh_tx: tx,
            refreshing: false,
            refresh_retry_pending: false,

            status_message: None,
        };

        if app.session.is_authenticated() {
            app.spawn_refresh();
        }

        Ok(app)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Gate check, run once per frame: if the session no longer permits
    /// the current tab, capture it and bring up the login screen.
    pub fn apply_gate(&mut self) {
        if self.state != AppState::Normal {
            return;
        }
        match gate::decide(self.session.phase(), self.current_tab) {
            GateDecision::Render | GateDecision::Loading => {}
            GateDecision::RedirectToLogin { resume } => {
                self.pending_tab = Some(resume);
                self.start_login();
            }
        }
    }

    /// Show the login overlay
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let username = self.login_username.clone();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return Err(anyhow::anyhow!("Username and password required"));
        }

        self.login_error = None;

        match self.session.login(&username, &password).await {
            Ok(()) => {
                self.after_login_success(&username, &password);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                // a remembered password that was just rejected must not
                // prefill the next session
                if matches!(e, AuthError::InvalidCredentials(_))
                    && Keychain::has_password(&username)
                {
                    if let Err(err) = Keychain::delete(&username) {
                        warn!(error = %err, "Failed to remove rejected password from keychain");
                    }
                }
                self.login_error = self
                    .session
                    .last_error()
                    .or_else(|| Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn after_login_success(&mut self, username: &str, password: &str) {
        if let Some(token) = self.session.access_token() {
            self.api.set_token(token);
        }

        if self.remember_password {
            if let Err(e) = Keychain::store(username, password) {
                warn!(error = %e, "Failed to store password in keychain");
            }
        }

        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.login_password.clear();
        self.state = AppState::Normal;
        if let Some(tab) = self.pending_tab.take() {
            self.current_tab = tab;
        }
        self.refresh_retry_pending = false;
        info!("Login successful");
        self.spawn_refresh();
    }

    /// Log out and return to the login screen
    pub fn logout(&mut self) {
        self.session.logout();
        self.api.clear_token();
        self.summary = DashboardSummary::default();
        self.orders.clear();
        self.orders_selection = 0;
        self.start_login();
    }

    /// Interactive login for the `--login` CLI path
    pub async fn login_interactive(&mut self) -> Result<()> {
        println!("\n=== shopdash login ===\n");

        if self.login_username.is_empty() {
            print!("Username: ");
        } else {
            print!("Username [{}]: ", self.login_username);
        }
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();
        let username = if input.is_empty() {
            self.login_username.clone()
        } else {
            input.to_string()
        };

        let password = if Keychain::has_password(&username) {
            print!("Use stored password? [Y/n]: ");
            io::stdout().flush()?;
            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            if answer.trim().to_lowercase() != "n" {
                Keychain::get_password(&username)?
            } else {
                rpassword::prompt_password("Password: ")?
            }
        } else {
            rpassword::prompt_password("Password: ")?
        };

        println!("\nSigning in...");
        self.session.login(&username, &password).await?;
        self.after_login_success(&username, &password);
        println!("Login successful!\n");
        Ok(())
    }

    // =========================================================================
    // Background refresh
    // =========================================================================

    /// Fetch dashboard data in the background, reporting over the channel
    pub fn spawn_refresh(&mut self) {
        if !self.session.is_authenticated() || self.refreshing {
            return;
        }
        self.refreshing = true;
        self.status_message = Some("Refreshing...".to_string());

        let api = self.api.clone();
        let tx = self.refresh_tx.clone();

        tokio::spawn(async move {
            let mut unauthorized = false;

            match api.fetch_summary().await {
                Ok(summary) => {
                    let _ = tx.send(RefreshResult::Summary(summary)).await;
                }
                Err(ApiError::Unauthorized) => unauthorized = true,
                Err(e) => {
                    let _ = tx.send(RefreshResult::Error(e.user_message())).await;
                }
            }

            if !unauthorized {
                match api.fetch_recent_orders().await {
                    Ok(orders) => {
                        let _ = tx.send(RefreshResult::Orders(orders)).await;
                    }
                    Err(ApiError::Unauthorized) => unauthorized = true,
                    Err(e) => {
                        let _ = tx.send(RefreshResult::Error(e.user_message())).await;
                    }
                }
            }

            if unauthorized {
                let _ = tx.send(RefreshResult::Unauthorized).await;
            }
            let _ = tx.send(RefreshResult::RefreshComplete).await;
        });
    }

    /// Drain completed background work. Called from the event loop.
    pub async fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        if let Some(rx) = &mut self.refresh_rx {
            while let Ok(result) = rx.try_recv() {
                results.push(result);
            }
        }
        for result in results {
            self.handle_refresh_result(result).await;
        }
    }

    async fn handle_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Summary(summary) => {
                self.summary = summary;
                self.refresh_retry_pending = false;
            }
            RefreshResult::Orders(orders) => {
                self.orders_selection = self
                    .orders_selection
                    .min(orders.len().saturating_sub(1));
                self.orders = orders;
                self.refresh_retry_pending = false;
            }
            RefreshResult::Unauthorized => {
                self.handle_unauthorized().await;
            }
            RefreshResult::Error(message) => {
                warn!(message, "Background refresh error");
                self.status_message = Some(message);
            }
            RefreshResult::RefreshComplete => {
                self.refreshing = false;
                if self.status_message.as_deref() == Some("Refreshing...") {
                    self.status_message = Some("Updated".to_string());
                }
            }
        }
    }

    /// A data fetch hit a 401: silently refresh the access token and
    /// retry once; if the refresh fails (which logs the session out) or
    /// the retry also comes back 401, fall back to the login screen.
    async fn handle_unauthorized(&mut self) {
        if self.refresh_retry_pending {
            warn!("Still unauthorized after token refresh, forcing re-login");
            self.refresh_retry_pending = false;
            self.logout();
            return;
        }

        info!("Access token rejected, attempting silent refresh");
        match self.session.refresh().await {
            Ok(token) => {
                self.api.set_token(token);
                self.refresh_retry_pending = true;
                self.refreshing = false;
                self.spawn_refresh();
            }
            Err(e) => {
                warn!(error = %e, "Silent refresh failed");
                self.api.clear_token();
                self.status_message = Some("Session expired - please sign in again".to_string());
                self.start_login();
            }
        }
    }
}
