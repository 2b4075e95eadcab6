use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{AuthResponse, Credentials, Identity, IdentityPatch};

/// Version written into the persisted envelope. Records with any other
/// version are discarded on restore.
pub const SNAPSHOT_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "Unauthenticated"),
            SessionState::Authenticating => write!(f, "Authenticating"),
            SessionState::Authenticated => write!(f, "Authenticated"),
        }
    }
}

/// In-memory session. `authenticated` always mirrors `access_token.is_some()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<Identity>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub authenticated: bool,
    pub in_flight: bool,
}

impl Session {
    pub fn state(&self) -> SessionState {
        if self.in_flight {
            SessionState::Authenticating
        } else if self.authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Both credentials, when the session holds a complete pair
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(Credentials {
                access_token: access.clone(),
                refresh_token: refresh.clone(),
            }),
            _ => None,
        }
    }

    pub(crate) fn begin_authentication(&mut self) {
        self.in_flight = true;
    }

    pub(crate) fn complete_authentication(&mut self, response: AuthResponse) {
        self.user = Some(response.user);
        self.access_token = Some(response.token);
        self.refresh_token = Some(response.refresh_token);
        self.authenticated = true;
        self.in_flight = false;
    }

    /// A failed attempt never touches an existing authentication.
    pub(crate) fn fail_authentication(&mut self) {
        self.in_flight = false;
    }

    pub(crate) fn apply_refresh(&mut self, access_token: String) {
        self.access_token = Some(access_token);
        self.authenticated = true;
    }

    pub(crate) fn clear(&mut self) {
        *self = Session::default();
    }

    /// Returns false when there is no identity to update.
    pub(crate) fn update_profile(&mut self, patch: &IdentityPatch) -> bool {
        match self.user.as_mut() {
            Some(user) => {
                user.apply(patch);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            authenticated: self.authenticated,
        }
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            user: snapshot.user,
            access_token: snapshot.token,
            refresh_token: snapshot.refresh_token,
            authenticated: snapshot.authenticated,
            in_flight: false,
        }
    }
}

/// Durable projection of a [`Session`]; never carries the in-flight flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<Identity>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub authenticated: bool,
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    state: SessionSnapshot,
    version: u32,
}

impl SessionSnapshot {
    pub fn is_consistent(&self) -> bool {
        self.authenticated == self.token.is_some()
    }

    pub fn to_record(&self) -> Result<String> {
        let record = PersistedRecord {
            state: self.clone(),
            version: SNAPSHOT_VERSION,
        };
        serde_json::to_string(&record).context("Failed to serialize session snapshot")
    }

    /// Parse and validate a stored record
    pub fn from_record(raw: &str) -> Result<Self> {
        let record: PersistedRecord =
            serde_json::from_str(raw).context("Failed to parse session snapshot")?;
        if record.version != SNAPSHOT_VERSION {
            bail!(
                "Unsupported session snapshot version {} (expected {})",
                record.version,
                SNAPSHOT_VERSION
            );
        }
        if !record.state.is_consistent() {
            bail!("Session snapshot authenticated flag does not match its token");
        }
        Ok(record.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::KycStatus;

    fn identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            kyc_status: KycStatus::Verified,
            kyc_level: 1,
            risk_score: 3.0,
            mfa_enabled: false,
            created_at: Utc::now(),
            last_login_at: Some(Utc::now()),
        }
    }

    fn authenticated_session() -> Session {
        let mut session = Session::default();
        session.begin_authentication();
        session.complete_authentication(AuthResponse {
            user: identity(),
            token: "T1".to_string(),
            refresh_token: "R1".to_string(),
        });
        session
    }

    #[test]
    fn test_state_transitions() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Unauthenticated);

        session.begin_authentication();
        assert_eq!(session.state(), SessionState::Authenticating);

        session.fail_authentication();
        assert_eq!(session.state(), SessionState::Unauthenticated);

        let session = authenticated_session();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.credentials().unwrap().access_token, "T1");
    }

    #[test]
    fn test_failed_attempt_keeps_existing_authentication() {
        let mut session = authenticated_session();
        session.begin_authentication();
        session.fail_authentication();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.access_token.as_deref(), Some("T1"));
    }

    #[test]
    fn test_snapshot_round_trip_excludes_in_flight() {
        let mut session = authenticated_session();
        session.in_flight = true;

        let raw = session.snapshot().to_record().unwrap();
        assert!(!raw.contains("inFlight"));

        let restored = Session::from_snapshot(SessionSnapshot::from_record(&raw).unwrap());
        assert_eq!(restored.user, session.user);
        assert_eq!(restored.access_token, session.access_token);
        assert_eq!(restored.refresh_token, session.refresh_token);
        assert!(restored.authenticated);
        assert!(!restored.in_flight);
    }

    #[test]
    fn test_record_envelope_format() {
        let raw = Session::default().snapshot().to_record().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 0);
        assert_eq!(
            value["state"],
            serde_json::json!({"user": null, "token": null, "refreshToken": null, "authenticated": false})
        );
    }

    #[test]
    fn test_from_record_rejects_invalid() {
        assert!(SessionSnapshot::from_record("not json").is_err());
        assert!(SessionSnapshot::from_record(
            r#"{"state":{"user":null,"token":null,"refreshToken":null,"authenticated":true},"version":0}"#
        )
        .is_err());
        assert!(SessionSnapshot::from_record(
            r#"{"state":{"user":null,"token":null,"refreshToken":null,"authenticated":false},"version":7}"#
        )
        .is_err());
    }

    #[test]
    fn test_update_profile_without_user_is_noop() {
        let mut session = Session::default();
        let patch = IdentityPatch {
            first_name: Some("X".to_string()),
            ..Default::default()
        };
        assert!(!session.update_profile(&patch));
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_clear() {
        let mut session = authenticated_session();
        session.clear();
        assert_eq!(session, Session::default());
    }
}
