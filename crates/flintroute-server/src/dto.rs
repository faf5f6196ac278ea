//! Wire request/response shapes for the HTTP surface. Kept separate
//! from the persistence-layer and domain types so a wire format change
//! never forces a schema or query change.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use flintroute_db::peers::PeerPatch;
use flintroute_peer::CreatePeerInput;
use flintroute_schemas::UserProjection;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserProjection,
}

#[derive(Debug, Deserialize)]
pub struct CreatePeerRequest {
    pub ip_address: String,
    pub local_asn: i64,
    pub remote_asn: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub multihop: Option<i32>,
    #[serde(default)]
    pub update_source: Option<String>,
    #[serde(default)]
    pub route_map_in: Option<String>,
    #[serde(default)]
    pub route_map_out: Option<String>,
    #[serde(default)]
    pub prefix_list_in: Option<String>,
    #[serde(default)]
    pub prefix_list_out: Option<String>,
    #[serde(default)]
    pub max_prefixes: Option<i32>,
    #[serde(default)]
    pub local_preference: Option<i32>,
}

fn default_enabled() -> bool {
    true
}

impl From<CreatePeerRequest> for CreatePeerInput {
    fn from(r: CreatePeerRequest) -> Self {
        CreatePeerInput {
            ip_address: r.ip_address,
            local_asn: r.local_asn,
            remote_asn: r.remote_asn,
            name: r.name,
            description: r.description,
            enabled: r.enabled,
            password: r.password,
            multihop: r.multihop,
            update_source: r.update_source,
            route_map_in: r.route_map_in,
            route_map_out: r.route_map_out,
            prefix_list_in: r.prefix_list_in,
            prefix_list_out: r.prefix_list_out,
            max_prefixes: r.max_prefixes,
            local_preference: r.local_preference,
        }
    }
}

/// Partial update. Scalar fields use a plain `Option<T>` (absent =
/// unchanged). Nullable columns use the classic "some means present"
/// trick so the body can distinguish "omit this key" (leave unchanged)
/// from `"field": null` (clear it) from `"field": "x"` (set it) — a
/// bare `Option<Option<T>>` on its own collapses the first two cases.
#[derive(Debug, Deserialize, Default)]
pub struct UpdatePeerRequest {
    #[serde(default)]
    pub local_asn: Option<i64>,
    #[serde(default)]
    pub remote_asn: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub password: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub multihop: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub update_source: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub route_map_in: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub route_map_out: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub prefix_list_in: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub prefix_list_out: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub max_prefixes: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub local_preference: Option<Option<i32>>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl From<UpdatePeerRequest> for PeerPatch {
    fn from(r: UpdatePeerRequest) -> Self {
        PeerPatch {
            local_asn: r.local_asn,
            remote_asn: r.remote_asn,
            name: r.name,
            description: r.description,
            enabled: r.enabled,
            password: r.password,
            multihop: r.multihop,
            update_source: r.update_source,
            route_map_in: r.route_map_in,
            route_map_out: r.route_map_out,
            prefix_list_in: r.prefix_list_in,
            prefix_list_out: r.prefix_list_out,
            max_prefixes: r.max_prefixes,
            local_preference: r.local_preference,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackupRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AlertListQuery {
    pub acknowledged: Option<bool>,
    pub severity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub database_ok: bool,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeActor {
    #[serde(default)]
    pub actor: Option<Uuid>,
}
