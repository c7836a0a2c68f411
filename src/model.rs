use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Outcome of a single availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// The page rendered the slot listing and none of the no-slot phrases matched.
    Available,
    /// The page rendered the slot listing with a recognized no-slot phrase.
    Unavailable,
    /// The flow never reached the slot listing (missing control, timeout, challenge page).
    Blocked,
    /// The probe failed before a verdict (driver or transport failure).
    Error,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Blocked => "blocked",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriberRole {
    #[default]
    Member,
    Admin,
}

impl std::fmt::Display for SubscriberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Member => "member",
            Self::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// Persisted monitor state. The table holds exactly one row, keyed with id 1.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MonitorStateModel {
    pub id: i64,
    pub interval_seconds: i64,
    pub running: bool,
    pub last_status: Option<ProbeStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_detail: Option<String>,
    pub last_evidence_path: Option<String>,
    pub consecutive_errors: i64,
}

impl MonitorStateModel {
    /// State for a fresh installation: stopped, nothing probed yet.
    pub fn initial(interval_seconds: i64) -> Self {
        Self {
            id: 1,
            interval_seconds,
            running: false,
            last_status: None,
            last_checked_at: None,
            last_detail: None,
            last_evidence_path: None,
            consecutive_errors: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SubscriberModel {
    pub chat_id: i64,
    pub role: SubscriberRole,
    pub active: bool,
    pub subscribed_at: DateTime<Utc>,
}
