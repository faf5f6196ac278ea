//! Shared entity and wire-event types for FlintRoute.
//!
//! Plain serde-derived structs only — no validation, no persistence
//! logic. Validation lives at the `flintroute-peer` boundary; queries
//! live in `flintroute-db`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User / Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::User => "user",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public-facing projection of a user (never carries the password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProjection {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

impl From<&User> for UserProjection {
    fn from(u: &User) -> Self {
        UserProjection {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            active: u.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// BGP peer / session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpPeer {
    pub id: Uuid,
    pub ip_address: String,
    pub local_asn: i64,
    pub remote_asn: i64,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub password: Option<String>,
    pub multihop: Option<i32>,
    pub update_source: Option<String>,
    pub route_map_in: Option<String>,
    pub route_map_out: Option<String>,
    pub prefix_list_in: Option<String>,
    pub prefix_list_out: Option<String>,
    pub max_prefixes: Option<i32>,
    pub local_preference: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connect => "Connect",
            SessionState::Active => "Active",
            SessionState::OpenSent => "OpenSent",
            SessionState::OpenConfirm => "OpenConfirm",
            SessionState::Established => "Established",
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(SessionState::Idle),
            "Connect" => Ok(SessionState::Connect),
            "Active" => Ok(SessionState::Active),
            "OpenSent" => Ok(SessionState::OpenSent),
            "OpenConfirm" => Ok(SessionState::OpenConfirm),
            "Established" => Ok(SessionState::Established),
            other => Err(format!("unknown session state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpSession {
    pub id: Uuid,
    pub peer_id: Uuid,
    pub state: SessionState,
    pub uptime_seconds: i64,
    pub prefixes_received: i64,
    pub prefixes_sent: i64,
    pub messages_received: i64,
    pub messages_sent: i64,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Session hydrated with its owning peer, as sent over the WebSocket hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProjection {
    pub session: BgpSession,
    pub peer: BgpPeer,
}

// ---------------------------------------------------------------------------
// Config snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigVersion {
    pub id: Uuid,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub config_blob: String,
    pub hash: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PeerUp,
    PeerDown,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PeerUp => "peer_up",
            AlertType::PeerDown => "peer_down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub peer_id: Option<Uuid>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Alert hydrated with its related peer (if any), as sent over the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertProjection {
    pub alert: Alert,
    pub peer: Option<BgpPeer>,
}

// ---------------------------------------------------------------------------
// Event bus / WebSocket envelope
// ---------------------------------------------------------------------------

/// The four EB topics, carrying fully hydrated payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    PeerUpdate(BgpPeer),
    SessionUpdate(SessionProjection),
    Alert(AlertProjection),
    ConfigChange(ConfigVersion),
}

/// Outbound WebSocket message: `{type, payload, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    #[serde(flatten)]
    pub event: DomainEvent,
    pub timestamp: DateTime<Utc>,
}

impl WsEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        WsEnvelope {
            event,
            timestamp: Utc::now(),
        }
    }
}
