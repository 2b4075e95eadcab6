//! Session manager: login, register, logout, refresh and local profile updates.
//!
//! Methods take `&self`. The session sits behind a mutex that is only held
//! between awaits, so overlapping calls are possible and whichever call
//! completes last decides the resulting state. There is no cancellation: a
//! logout issued while a login is in flight is overwritten if that login
//! later succeeds.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::session::{Session, SessionSnapshot, SessionState};
use crate::api::{ApiError, BearerAuth, IdentityClient};
use crate::models::{AuthResponse, Identity, IdentityPatch, LoginRequest, RegisterRequest};
use crate::storage::{SnapshotStore, SNAPSHOT_KEY};

/// Upper bound on the best-effort logout notification
pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 5;

pub struct SessionManager {
    client: Arc<dyn IdentityClient>,
    store: Arc<dyn SnapshotStore>,
    auth: BearerAuth,
    session: Mutex<Session>,
    logout_timeout: Duration,
}

impl SessionManager {
    /// Create a manager with an empty session, ignoring anything stored
    pub fn new(client: Arc<dyn IdentityClient>, store: Arc<dyn SnapshotStore>, auth: BearerAuth) -> Self {
        Self {
            client,
            store,
            auth,
            session: Mutex::new(Session::default()),
            logout_timeout: Duration::from_secs(DEFAULT_LOGOUT_TIMEOUT_SECS),
        }
    }

    /// Create a manager rehydrated from the persisted snapshot.
    ///
    /// A missing, unreadable or inconsistent record yields an unauthenticated
    /// session; a bad record is removed so it is not read again.
    pub fn restore(client: Arc<dyn IdentityClient>, store: Arc<dyn SnapshotStore>, auth: BearerAuth) -> Self {
        let manager = Self::new(client, store, auth);

        let session = match manager.store.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => match SessionSnapshot::from_record(&raw) {
                Ok(snapshot) => Session::from_snapshot(snapshot),
                Err(e) => {
                    warn!(error = %e, "Discarding invalid session snapshot");
                    if let Err(e) = manager.store.remove(SNAPSHOT_KEY) {
                        warn!(error = %e, "Failed to remove invalid session snapshot");
                    }
                    Session::default()
                }
            },
            Ok(None) => {
                debug!("No session snapshot found");
                Session::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session snapshot");
                Session::default()
            }
        };

        match session.access_token {
            Some(ref token) => manager.auth.set_credential(token),
            None => manager.auth.clear_credential(),
        }
        debug!(state = %session.state(), "Session restored");

        *manager.lock() = session;
        manager
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write the snapshot of `session`. Failures are logged; memory stays authoritative.
    fn persist(&self, session: &Session) {
        let result = session
            .snapshot()
            .to_record()
            .and_then(|raw| self.store.set(SNAPSHOT_KEY, &raw));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session snapshot");
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&self, email: &str, password: &str, mfa_code: Option<&str>) -> Result<Identity, ApiError> {
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput("email and password are required"));
        }

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            mfa_code: mfa_code.map(str::to_string),
        };
        self.authenticate("login", self.client.login(&request)).await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Identity, ApiError> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(ApiError::InvalidInput("email and password are required"));
        }

        self.authenticate("register", self.client.register(&request)).await
    }

    async fn authenticate<F>(&self, operation: &'static str, call: F) -> Result<Identity, ApiError>
    where
        F: Future<Output = Result<AuthResponse, ApiError>>,
    {
        self.lock().begin_authentication();

        let result = call.await;

        let mut session = self.lock();
        match result {
            Ok(response) => {
                self.auth.set_credential(&response.token);
                let user = response.user.clone();
                session.complete_authentication(response);
                self.persist(&session);
                info!(operation, user_id = %user.id, "Authentication successful");
                Ok(user)
            }
            Err(e) => {
                session.fail_authentication();
                self.persist(&session);
                debug!(operation, error = %e, state = %session.state(), "Authentication failed");
                Err(e)
            }
        }
    }

    /// Clear the local session, then notify the identity service if a
    /// credential was held. Never fails.
    pub async fn logout(&self) {
        let access_token = {
            let mut session = self.lock();
            let token = session.access_token.take();
            session.clear();
            self.auth.clear_credential();
            self.persist(&session);
            token
        };

        let Some(token) = access_token else {
            debug!("Logout with no active session");
            return;
        };
        info!("Logged out");

        match tokio::time::timeout(self.logout_timeout, self.client.logout(&token)).await {
            Ok(Ok(())) => debug!("Logout notification sent"),
            Ok(Err(e)) => debug!(error = %e, "Logout notification failed"),
            Err(_) => debug!("Logout notification timed out"),
        }
    }

    /// Exchange the refresh credential for a new access credential.
    /// Any failure ends the session via [`logout`](Self::logout).
    pub async fn refresh_session(&self) {
        let refresh_token = self.lock().refresh_token.clone();
        let Some(refresh_token) = refresh_token else {
            debug!("No refresh credential held, logging out");
            self.logout().await;
            return;
        };

        match self.client.refresh(&refresh_token).await {
            Ok(response) => {
                let mut session = self.lock();
                self.auth.set_credential(&response.token);
                session.apply_refresh(response.token);
                self.persist(&session);
                debug!("Access credential refreshed");
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, logging out");
                self.logout().await;
            }
        }
    }

    /// Merge `patch` into the cached identity. No network call is made.
    pub fn update_profile(&self, patch: &IdentityPatch) {
        let mut session = self.lock();
        if session.update_profile(patch) {
            self.persist(&session);
        } else {
            debug!("Profile update ignored, no identity held");
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }
}
