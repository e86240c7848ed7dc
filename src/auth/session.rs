//! Session lifecycle management.
//!
//! `SessionManager` is the single source of truth for "who is the
//! current user". It owns every transition of the session state machine
//! (restore-on-start, login, silent refresh, logout) and is the only
//! writer to the credential store, so persisted and in-memory state
//! never diverge across a transition.
//!
//! Concurrency: state lives behind a mutex that is never held across an
//! await. A busy flag serializes login/refresh so two token rotations
//! can't race each other in storage, and a generation counter makes the
//! completion of an operation that was overtaken by a logout a no-op.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::models::Profile;

use super::store::CredentialStore;
use super::token;

/// Discrete lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Startup: persisted credentials not yet examined
    Restoring,
    Unauthenticated,
    /// A login attempt is in flight
    Authenticating,
    Authenticated,
    /// The last login attempt failed; `last_error` says why
    Error,
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// Login rejected by the backend (surfaces the server's message)
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Could not load your profile: {0}")]
    ProfileFetchFailed(String),

    #[error("Failed to resolve user from access token")]
    ClaimDecodeFailed,

    #[error("Session expired: {0}")]
    RefreshFailed(String),

    #[error("{0}")]
    Transport(String),

    /// A login or refresh is already in flight
    #[error("Another sign-in is already in progress")]
    OperationInFlight,
}

/// Fresh credentials handed back by the backend.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// Absent when the backend chose not to rotate the refresh token
    pub refresh_token: Option<String>,
}

/// The three network operations the session depends on. `ApiClient`
/// implements this against the real backend; tests substitute mocks.
#[allow(async_fn_in_trait)]
pub trait AuthBackend {
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError>;
    /// The access token is passed explicitly: the client is stateless
    /// and this fetch runs before the app-wide client learns the token.
    async fn fetch_profile(&self, access_token: &str, user_id: &str) -> Result<Profile, ApiError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub user: Option<Profile>,
    pub access_token: Option<String>,
    pub last_error: Option<String>,
}

struct SessionState {
    phase: Phase,
    user: Option<Profile>,
    access_token: Option<String>,
    last_error: Option<String>,
    /// Serializes login/refresh: at most one in flight
    busy: bool,
    /// Bumped by logout and each login attempt; a completion whose
    /// generation no longer matches applies nothing
    generation: u64,
}

/// Outcome of the login flow body, separated from state application so
/// the phase transition happens in exactly one place.
enum LoginFlow {
    Completed {
        user: Profile,
        access_token: String,
    },
    /// A logout overtook this attempt; discard the result
    Superseded,
}

pub struct SessionManager<C> {
    backend: C,
    store: CredentialStore,
    state: Mutex<SessionState>,
}

impl<C: AuthBackend> SessionManager<C> {
    pub fn new(backend: C, store: CredentialStore) -> Self {
        Self {
            backend,
            store,
            state: Mutex::new(SessionState {
                phase: Phase::Restoring,
                user: None,
                access_token: None,
                last_error: None,
                busy: false,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }

    fn still_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    // ===== Read surface =====

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn user(&self) -> Option<Profile> {
        self.lock().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == Phase::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase(), Phase::Restoring | Phase::Authenticating)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.lock();
        SessionSnapshot {
            phase: s.phase,
            user: s.user.clone(),
            access_token: s.access_token.clone(),
            last_error: s.last_error.clone(),
        }
    }

    // ===== Transitions =====

    /// Resolve the `Restoring` phase from persisted credentials, without
    /// a network round-trip: a stored token and parsable profile
    /// snapshot are trusted as-is, and staleness surfaces on the first
    /// failed authenticated request (which triggers the refresh path).
    ///
    /// Runs at most once; returns whether a session was restored.
    pub fn restore(&self) -> bool {
        let stored = self.store.load();
        let mut s = self.lock();
        if s.phase != Phase::Restoring {
            return s.phase == Phase::Authenticated;
        }

        match (stored.access_token, stored.user) {
            (Some(access_token), Some(user)) => {
                info!(user = %user.username, "Session restored from disk");
                s.user = Some(user);
                s.access_token = Some(access_token);
                s.phase = Phase::Authenticated;
                true
            }
            _ => {
                debug!("No usable persisted session, clearing store");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear credential store");
                }
                s.phase = Phase::Unauthenticated;
                false
            }
        }
    }

    /// Run the login flow. At most one login/refresh may be in flight;
    /// a concurrent call gets `OperationInFlight` immediately.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let generation = {
            let mut s = self.lock();
            if s.busy {
                return Err(AuthError::OperationInFlight);
            }
            s.busy = true;
            s.generation += 1;
            s.phase = Phase::Authenticating;
            s.last_error = None;
            s.user = None;
            s.access_token = None;
            s.generation
        };

        let outcome = self.run_login(username, password, generation).await;
        self.finish_login(generation, outcome)
    }

    async fn run_login(
        &self,
        username: &str,
        password: &str,
        generation: u64,
    ) -> Result<LoginFlow, AuthError> {
        let pair = match self.backend.login(username, password).await {
            Ok(pair) => pair,
            Err(ApiError::Rejected(message)) => {
                return Err(AuthError::InvalidCredentials(message))
            }
            Err(ApiError::Unauthorized) => {
                return Err(AuthError::InvalidCredentials(
                    "Invalid username or password".to_string(),
                ))
            }
            Err(e) => return Err(AuthError::Transport(e.user_message())),
        };

        if !self.still_current(generation) {
            return Ok(LoginFlow::Superseded);
        }

        // Persist tokens before any further request, so an authenticated
        // request fired elsewhere already finds a usable token.
        let refresh = pair.refresh_token.as_deref().unwrap_or_default();
        if let Err(e) = self.store.save_tokens(&pair.access_token, refresh) {
            warn!(error = %e, "Failed to persist tokens");
        }

        let claims = token::decode_claims(&pair.access_token);
        let Some(user_id) = token::user_id(&claims) else {
            return Err(AuthError::ClaimDecodeFailed);
        };

        let user = self
            .backend
            .fetch_profile(&pair.access_token, &user_id)
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.user_message()))?;

        if !self.still_current(generation) {
            return Ok(LoginFlow::Superseded);
        }

        if let Err(e) = self.store.save_user(&user) {
            warn!(error = %e, "Failed to persist profile snapshot");
        }

        Ok(LoginFlow::Completed {
            user,
            access_token: pair.access_token,
        })
    }

    fn finish_login(
        &self,
        generation: u64,
        outcome: Result<LoginFlow, AuthError>,
    ) -> Result<(), AuthError> {
        let mut s = self.lock();
        if s.generation != generation {
            debug!("Discarding login result overtaken by logout");
            return Ok(());
        }
        s.busy = false;

        match outcome {
            Ok(LoginFlow::Completed { user, access_token }) => {
                info!(user = %user.username, "Login successful");
                s.user = Some(user);
                s.access_token = Some(access_token);
                s.last_error = None;
                s.phase = Phase::Authenticated;
                Ok(())
            }
            Ok(LoginFlow::Superseded) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Login failed");
                s.user = None;
                s.access_token = None;
                s.last_error = Some(e.to_string());
                s.phase = Phase::Error;
                Err(e)
            }
        }
    }

    /// Rotate the access token using the stored refresh token. Called by
    /// the data layer when a request comes back unauthorized. On any
    /// failure the session is fully logged out so later requests are not
    /// attempted with a known-dead token, and the error is propagated so
    /// the caller can redirect to login.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let generation = {
            let mut s = self.lock();
            if s.busy {
                return Err(AuthError::OperationInFlight);
            }
            s.busy = true;
            s.generation
        };

        let outcome = match self.store.load().refresh_token {
            None => Err(AuthError::RefreshFailed(
                "No refresh token available".to_string(),
            )),
            Some(refresh_token) => match self.backend.refresh(&refresh_token).await {
                Ok(pair) => Ok(pair),
                Err(e) => Err(AuthError::RefreshFailed(e.user_message())),
            },
        };

        let mut s = self.lock();
        if s.generation != generation {
            debug!("Discarding refresh result overtaken by logout");
            return Err(AuthError::RefreshFailed("Session ended".to_string()));
        }
        s.busy = false;

        match outcome {
            Ok(pair) => {
                // Persist before announcing; the refresh token only
                // rotates when the backend sent a new one.
                let persisted = match pair.refresh_token.as_deref() {
                    Some(rotated) => self.store.save_tokens(&pair.access_token, rotated),
                    None => self.store.save_access_token(&pair.access_token),
                };
                if let Err(e) = persisted {
                    warn!(error = %e, "Failed to persist refreshed token");
                }
                s.access_token = Some(pair.access_token.clone());
                s.last_error = None;
                info!("Access token refreshed");
                Ok(pair.access_token)
            }
            Err(e) => {
                drop(s);
                warn!(error = %e, "Token refresh failed, logging out");
                self.logout();
                Err(e)
            }
        }
    }

    /// Drop the session unconditionally: clear the store, reset the
    /// in-memory state, and invalidate any in-flight login or refresh.
    /// Logout never fails; a store error is logged and swallowed.
    pub fn logout(&self) {
        let mut s = self.lock();
        s.generation += 1;
        s.busy = false;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store on logout");
        }
        s.user = None;
        s.access_token = None;
        s.last_error = None;
        s.phase = Phase::Unauthenticated;
        info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::auth::token::make_token;

    // ===== Mock backend =====

    #[derive(Clone)]
    enum MockResponse<T> {
        Ok(T),
        Rejected(String),
        Transport,
        Unused,
    }

    impl<T: Clone> MockResponse<T> {
        fn to_result(&self) -> Result<T, ApiError> {
            match self {
                MockResponse::Ok(v) => Ok(v.clone()),
                MockResponse::Rejected(m) => Err(ApiError::Rejected(m.clone())),
                MockResponse::Transport => {
                    Err(ApiError::ServerError("connection reset".to_string()))
                }
                MockResponse::Unused => panic!("unexpected backend call"),
            }
        }
    }

    #[derive(Default)]
    struct CallCounts {
        login: AtomicUsize,
        profile: AtomicUsize,
        refresh: AtomicUsize,
    }

    struct MockBackend {
        login: MockResponse<TokenPair>,
        profile: MockResponse<Profile>,
        refresh: MockResponse<TokenPair>,
        login_delay: Option<Duration>,
        calls: Arc<CallCounts>,
    }

    impl AuthBackend for MockBackend {
        async fn login(&self, _username: &str, _password: &str) -> Result<TokenPair, ApiError> {
            self.calls.login.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.login_delay {
                tokio::time::sleep(delay).await;
            }
            self.login.to_result()
        }

        async fn fetch_profile(&self, _token: &str, _user_id: &str) -> Result<Profile, ApiError> {
            self.calls.profile.fetch_add(1, Ordering::SeqCst);
            self.profile.to_result()
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
            self.calls.refresh.fetch_add(1, Ordering::SeqCst);
            self.refresh.to_result()
        }
    }

    fn alice() -> Profile {
        Profile {
            id: "u1".to_string(),
            username: "alice".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: Some("Smith".to_string()),
            email: None,
            role: "Admin".to_string(),
        }
    }

    fn valid_access_token() -> String {
        make_token(r#"{"id":"u1"}"#)
    }

    fn happy_backend() -> MockBackend {
        MockBackend {
            login: MockResponse::Ok(TokenPair {
                access_token: valid_access_token(),
                refresh_token: Some("rt-1".to_string()),
            }),
            profile: MockResponse::Ok(alice()),
            refresh: MockResponse::Unused,
            login_delay: None,
            calls: Arc::new(CallCounts::default()),
        }
    }

    fn manager(dir: &TempDir, backend: MockBackend) -> SessionManager<MockBackend> {
        SessionManager::new(backend, CredentialStore::new(dir.path().to_path_buf()))
    }

    /// A second store handle on the same directory, for asserting what
    /// the manager persisted.
    fn store_view(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().to_path_buf())
    }

    fn assert_invariants(mgr: &SessionManager<MockBackend>) {
        let snap = mgr.snapshot();
        let has_both = snap.user.is_some()
            && snap.access_token.as_deref().is_some_and(|t| !t.is_empty());
        assert_eq!(
            snap.phase == Phase::Authenticated,
            has_both,
            "authenticated iff user and token present: {:?}",
            snap
        );
        if matches!(snap.phase, Phase::Unauthenticated | Phase::Error) {
            assert!(snap.user.is_none() && snap.access_token.is_none());
        }
    }

    // ===== Restore =====

    #[tokio::test]
    async fn restore_with_valid_credentials_is_offline() {
        let dir = TempDir::new().unwrap();
        let seed = store_view(&dir);
        seed.save_tokens(&valid_access_token(), "rt-1").unwrap();
        seed.save_user(&alice()).unwrap();

        let backend = happy_backend();
        let calls = backend.calls.clone();
        let mgr = manager(&dir, backend);

        assert_eq!(mgr.phase(), Phase::Restoring);
        assert!(mgr.is_loading());
        assert!(mgr.restore());

        assert_eq!(mgr.phase(), Phase::Authenticated);
        assert_eq!(mgr.user().unwrap().id, "u1");
        // optimistic restore: no network round-trip
        assert_eq!(calls.login.load(Ordering::SeqCst), 0);
        assert_eq!(calls.profile.load(Ordering::SeqCst), 0);
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn restore_without_snapshot_clears_store() {
        let dir = TempDir::new().unwrap();
        store_view(&dir).save_tokens("some-token", "rt-1").unwrap();

        let mgr = manager(&dir, happy_backend());
        assert!(!mgr.restore());

        assert_eq!(mgr.phase(), Phase::Unauthenticated);
        let stored = store_view(&dir).load();
        assert!(stored.access_token.is_none());
        assert!(stored.refresh_token.is_none());
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn restore_with_corrupt_snapshot_resolves_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let raw = r#"{"access_token":"tok","refresh_token":"rt","user":"{broken json"}"#;
        std::fs::write(dir.path().join("credentials.json"), raw).unwrap();

        let mgr = manager(&dir, happy_backend());
        assert!(!mgr.restore());

        assert_eq!(mgr.phase(), Phase::Unauthenticated);
        assert!(store_view(&dir).load().access_token.is_none());
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn restore_runs_only_once() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, happy_backend());
        assert!(!mgr.restore());

        mgr.login("alice", "secret").await.unwrap();
        // a second restore must not clobber the authenticated session
        assert!(mgr.restore());
        assert_eq!(mgr.phase(), Phase::Authenticated);
    }

    // ===== Login =====

    #[tokio::test]
    async fn login_happy_path() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, happy_backend());
        mgr.restore();

        mgr.login("alice", "secret").await.unwrap();

        let snap = mgr.snapshot();
        assert_eq!(snap.phase, Phase::Authenticated);
        assert_eq!(snap.user.as_ref().unwrap().id, "u1");
        assert!(snap.last_error.is_none());
        assert!(mgr.is_authenticated());

        // store matches memory after the transition
        let stored = store_view(&dir).load();
        assert_eq!(stored.access_token, snap.access_token);
        assert_eq!(stored.user, snap.user);
        assert_eq!(stored.refresh_token.as_deref(), Some("rt-1"));
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn login_with_bad_credentials_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.login = MockResponse::Rejected("Invalid username or password".to_string());
        let mgr = manager(&dir, backend);
        mgr.restore();

        let err = mgr.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));

        assert_eq!(mgr.phase(), Phase::Error);
        assert_eq!(
            mgr.last_error().as_deref(),
            Some("Invalid username or password")
        );
        let stored = store_view(&dir).load();
        assert!(stored.access_token.is_none());
        assert!(stored.refresh_token.is_none());
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn login_with_undecodable_token_errors_but_keeps_tokens() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.login = MockResponse::Ok(TokenPair {
            access_token: "not-a-jwt".to_string(),
            refresh_token: Some("rt-1".to_string()),
        });
        let mgr = manager(&dir, backend);
        mgr.restore();

        let err = mgr.login("alice", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::ClaimDecodeFailed));

        assert_eq!(mgr.phase(), Phase::Error);
        assert!(mgr
            .last_error()
            .unwrap()
            .to_lowercase()
            .contains("resolve user"));
        // known sharp edge: the tokens were persisted before decoding
        let stored = store_view(&dir).load();
        assert_eq!(stored.access_token.as_deref(), Some("not-a-jwt"));
        assert_eq!(stored.refresh_token.as_deref(), Some("rt-1"));
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn login_with_failed_profile_fetch_keeps_tokens() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.profile = MockResponse::Rejected("User not found".to_string());
        let mgr = manager(&dir, backend);
        mgr.restore();

        let err = mgr.login("alice", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::ProfileFetchFailed(_)));

        assert_eq!(mgr.phase(), Phase::Error);
        assert!(mgr.last_error().unwrap().contains("User not found"));
        // partial-success state: tokens persisted, no snapshot
        let stored = store_view(&dir).load();
        assert!(stored.access_token.is_some());
        assert!(stored.user.is_none());
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn login_transport_failure_surfaces_generic_message() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.login = MockResponse::Transport;
        let mgr = manager(&dir, backend);
        mgr.restore();

        let err = mgr.login("alice", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        assert_eq!(mgr.phase(), Phase::Error);
        assert_invariants(&mgr);
    }

    #[tokio::test(start_paused = true)]
    async fn second_login_rejected_while_first_in_flight() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.login_delay = Some(Duration::from_millis(50));
        let calls = backend.calls.clone();
        let mgr = manager(&dir, backend);
        mgr.restore();

        let (first, second) = tokio::join!(mgr.login("alice", "secret"), async {
            // let the first call claim the busy flag
            tokio::time::sleep(Duration::from_millis(10)).await;
            mgr.login("mallory", "hunter2").await
        });

        first.unwrap();
        assert!(matches!(second, Err(AuthError::OperationInFlight)));
        // only one token pair was ever requested or persisted
        assert_eq!(calls.login.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.user().unwrap().username, "alice");
        assert_invariants(&mgr);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_login_makes_completion_a_noop() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.login_delay = Some(Duration::from_millis(50));
        let mgr = manager(&dir, backend);
        mgr.restore();

        let (login_result, _) = tokio::join!(mgr.login("alice", "secret"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mgr.logout();
        });

        // the stale completion is swallowed, not an error
        login_result.unwrap();
        assert_eq!(mgr.phase(), Phase::Unauthenticated);
        assert!(mgr.user().is_none());
        let stored = store_view(&dir).load();
        assert!(stored.access_token.is_none());
        assert!(stored.user.is_none());
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn relogin_after_error_clears_last_error() {
        let dir = TempDir::new().unwrap();
        let mut backend = happy_backend();
        backend.login = MockResponse::Rejected("Invalid username or password".to_string());
        let mgr = manager(&dir, backend);
        mgr.restore();

        let _ = mgr.login("alice", "wrong").await;
        assert!(mgr.last_error().is_some());

        // swap in a working backend by building a fresh manager over the
        // same store, as a restart would
        let mgr = manager(&dir, happy_backend());
        mgr.restore();
        mgr.login("alice", "secret").await.unwrap();
        assert!(mgr.last_error().is_none());
        assert_eq!(mgr.phase(), Phase::Authenticated);
    }

    // ===== Refresh =====

    async fn authenticated_manager(
        dir: &TempDir,
        refresh: MockResponse<TokenPair>,
    ) -> SessionManager<MockBackend> {
        let mut backend = happy_backend();
        backend.refresh = refresh;
        let mgr = manager(dir, backend);
        mgr.restore();
        mgr.login("alice", "secret").await.unwrap();
        mgr
    }

    #[tokio::test]
    async fn refresh_rotates_access_token_only() {
        let dir = TempDir::new().unwrap();
        let mgr = authenticated_manager(
            &dir,
            MockResponse::Ok(TokenPair {
                access_token: "at-2".to_string(),
                refresh_token: None,
            }),
        )
        .await;

        let new_token = mgr.refresh().await.unwrap();
        assert_eq!(new_token, "at-2");
        assert_eq!(mgr.access_token().as_deref(), Some("at-2"));
        // user untouched, refresh token not rotated
        assert_eq!(mgr.user().unwrap().id, "u1");
        let stored = store_view(&dir).load();
        assert_eq!(stored.access_token.as_deref(), Some("at-2"));
        assert_eq!(stored.refresh_token.as_deref(), Some("rt-1"));
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn refresh_persists_rotated_refresh_token() {
        let dir = TempDir::new().unwrap();
        let mgr = authenticated_manager(
            &dir,
            MockResponse::Ok(TokenPair {
                access_token: "at-2".to_string(),
                refresh_token: Some("rt-2".to_string()),
            }),
        )
        .await;

        mgr.refresh().await.unwrap();
        let stored = store_view(&dir).load();
        assert_eq!(stored.refresh_token.as_deref(), Some("rt-2"));
    }

    #[tokio::test]
    async fn rejected_refresh_cascades_to_logout() {
        let dir = TempDir::new().unwrap();
        let mgr =
            authenticated_manager(&dir, MockResponse::Rejected("Refresh token expired".into()))
                .await;

        let err = mgr.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));

        assert_eq!(mgr.phase(), Phase::Unauthenticated);
        assert!(mgr.user().is_none());
        let stored = store_view(&dir).load();
        assert!(stored.access_token.is_none());
        assert!(stored.refresh_token.is_none());
        assert!(stored.user.is_none());
        assert_invariants(&mgr);
    }

    #[tokio::test]
    async fn refresh_without_stored_token_logs_out() {
        let dir = TempDir::new().unwrap();
        let mgr = authenticated_manager(&dir, MockResponse::Unused).await;
        // simulate an out-of-band loss of the refresh token
        let raw = format!(
            r#"{{"access_token":"{}","refresh_token":null}}"#,
            mgr.access_token().unwrap()
        );
        std::fs::write(dir.path().join("credentials.json"), raw).unwrap();

        let err = mgr.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
        assert_eq!(mgr.phase(), Phase::Unauthenticated);
        assert_invariants(&mgr);
    }

    // ===== Logout =====

    #[tokio::test]
    async fn logout_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, happy_backend());
        mgr.restore();
        mgr.login("alice", "secret").await.unwrap();

        for _ in 0..2 {
            mgr.logout();
            let snap = mgr.snapshot();
            assert_eq!(snap.phase, Phase::Unauthenticated);
            assert!(snap.user.is_none());
            assert!(snap.access_token.is_none());
            assert!(snap.last_error.is_none());
            let stored = store_view(&dir).load();
            assert!(stored.access_token.is_none());
            assert!(stored.refresh_token.is_none());
            assert!(stored.user.is_none());
            assert_invariants(&mgr);
        }
    }
}
