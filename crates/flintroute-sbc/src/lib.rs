//! Southbound client.
//!
//! A small capability set over the daemon's management channel.
//! Idempotent; callers must tolerate transient unavailability. The SBC
//! itself never retries — it classifies the failure and the caller
//! decides (PC logs-and-continues, SM logs-and-skips-this-tick).

use async_trait::async_trait;
use flintroute_schemas::BgpPeer;

pub mod grpc;
pub mod mock;

mod proto {
    tonic::include_proto!("flintroute.southbound.v1");
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SbcError {
    /// Retryable: connection loss, RPC deadline. The caller may retry
    /// on a later tick/request.
    #[error("southbound transient failure: {0}")]
    Transient(String),
    /// The daemon rejected the spec outright; retrying with the same
    /// input will not help.
    #[error("southbound rejected the request: {0}")]
    Permanent(String),
    /// `get_session` only: the daemon has no session for this peer.
    #[error("peer {0} is unknown to the southbound daemon")]
    PeerUnknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: String,
    pub uptime_seconds: i64,
    pub prefixes_received: i64,
    pub prefixes_sent: i64,
    pub messages_received: i64,
    pub messages_sent: i64,
    pub last_error: Option<String>,
}

/// Everything needed to declare a peer to the daemon. Built from a
/// `BgpPeer` row by the caller (`flintroute-peer`); kept as its own
/// type so `flintroute-sbc` does not need to know about persistence.
#[derive(Debug, Clone)]
pub struct PeerSpec {
    pub ip_address: String,
    pub local_asn: i64,
    pub remote_asn: i64,
    pub password: Option<String>,
    pub multihop: Option<i32>,
    pub update_source: Option<String>,
    pub route_map_in: Option<String>,
    pub route_map_out: Option<String>,
    pub prefix_list_in: Option<String>,
    pub prefix_list_out: Option<String>,
    pub max_prefixes: Option<i32>,
    pub local_preference: Option<i32>,
}

impl From<&BgpPeer> for PeerSpec {
    fn from(p: &BgpPeer) -> Self {
        PeerSpec {
            ip_address: p.ip_address.clone(),
            local_asn: p.local_asn,
            remote_asn: p.remote_asn,
            password: p.password.clone(),
            multihop: p.multihop,
            update_source: p.update_source.clone(),
            route_map_in: p.route_map_in.clone(),
            route_map_out: p.route_map_out.clone(),
            prefix_list_in: p.prefix_list_in.clone(),
            prefix_list_out: p.prefix_list_out.clone(),
            max_prefixes: p.max_prefixes,
            local_preference: p.local_preference,
        }
    }
}

/// The capability set consumed by `flintroute-peer`, `flintroute-monitor`
/// and `flintroute-snapshot`. Transport-agnostic so those crates are
/// unit-testable without a live FRR sidecar.
#[async_trait]
pub trait SouthboundClient: Send + Sync {
    async fn add_peer(&self, spec: &PeerSpec) -> Result<(), SbcError>;
    async fn update_peer(&self, spec: &PeerSpec) -> Result<(), SbcError>;
    async fn remove_peer(&self, ip_address: &str) -> Result<(), SbcError>;
    async fn get_running_config(&self) -> Result<String, SbcError>;
    async fn get_session(&self, ip_address: &str) -> Result<SessionSnapshot, SbcError>;
}
