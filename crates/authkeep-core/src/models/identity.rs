use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

/// Know-your-customer verification state reported by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KycStatus::NotStarted => write!(f, "Not started"),
            KycStatus::Pending => write!(f, "Pending"),
            KycStatus::Verified => write!(f, "Verified"),
            KycStatus::Rejected => write!(f, "Rejected"),
            KycStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The authenticated user, as returned by login/register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub kyc_level: u8,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default)]
    pub mfa_enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Shallow-merge the fields present in `patch`. The id is never touched.
    pub fn apply(&mut self, patch: &IdentityPatch) {
        if let Some(ref email) = patch.email {
            self.email = email.clone();
        }
        if let Some(ref first_name) = patch.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(ref last_name) = patch.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(kyc_status) = patch.kyc_status {
            self.kyc_status = kyc_status;
        }
        if let Some(kyc_level) = patch.kyc_level {
            self.kyc_level = kyc_level;
        }
        if let Some(risk_score) = patch.risk_score {
            self.risk_score = risk_score;
        }
        if let Some(mfa_enabled) = patch.mfa_enabled {
            self.mfa_enabled = mfa_enabled;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(last_login_at) = patch.last_login_at {
            self.last_login_at = Some(last_login_at);
        }
    }
}

/// Partial identity used for local profile updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_status: Option<KycStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}
