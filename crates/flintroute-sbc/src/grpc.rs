//! Production southbound adapter: a thin `tonic` client over the FRR
//! management sidecar's gRPC channel. Grounded on the same tonic/prost
//! pairing a routing-daemon workspace in the example pack
//! (`zebra-rs-zebra-rs`) uses for its own control channel.

use async_trait::async_trait;
use tonic::{transport::Channel, Code, Status};

use crate::proto::{
    southbound_client::SouthboundClient as GrpcSouthboundClient, GetRunningConfigRequest,
    GetSessionRequest, PeerSpec as ProtoPeerSpec, RemovePeerRequest,
};
use crate::{PeerSpec, SbcError, SessionSnapshot, SouthboundClient};

pub struct GrpcSbc {
    client: GrpcSouthboundClient<Channel>,
}

impl GrpcSbc {
    /// Connect lazily over an already-resolved `Channel`. Callers build
    /// the channel (host/port, TLS, timeouts) so connection policy
    /// lives at the call site, not inside this adapter.
    pub fn new(channel: Channel) -> Self {
        GrpcSbc {
            client: GrpcSouthboundClient::new(channel),
        }
    }
}

fn classify(status: Status) -> SbcError {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Aborted | Code::Cancelled => {
            SbcError::Transient(status.message().to_string())
        }
        Code::NotFound => SbcError::PeerUnknown(status.message().to_string()),
        _ => SbcError::Permanent(status.message().to_string()),
    }
}

fn to_proto_spec(spec: &PeerSpec) -> ProtoPeerSpec {
    ProtoPeerSpec {
        ip_address: spec.ip_address.clone(),
        local_asn: spec.local_asn,
        remote_asn: spec.remote_asn,
        password: spec.password.clone(),
        multihop: spec.multihop,
        update_source: spec.update_source.clone(),
        route_map_in: spec.route_map_in.clone(),
        route_map_out: spec.route_map_out.clone(),
        prefix_list_in: spec.prefix_list_in.clone(),
        prefix_list_out: spec.prefix_list_out.clone(),
        max_prefixes: spec.max_prefixes,
        local_preference: spec.local_preference,
    }
}

#[async_trait]
impl SouthboundClient for GrpcSbc {
    async fn add_peer(&self, spec: &PeerSpec) -> Result<(), SbcError> {
        let mut client = self.client.clone();
        client
            .add_peer(to_proto_spec(spec))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_peer(&self, spec: &PeerSpec) -> Result<(), SbcError> {
        let mut client = self.client.clone();
        client
            .update_peer(to_proto_spec(spec))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn remove_peer(&self, ip_address: &str) -> Result<(), SbcError> {
        let mut client = self.client.clone();
        client
            .remove_peer(RemovePeerRequest {
                ip_address: ip_address.to_string(),
            })
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn get_running_config(&self) -> Result<String, SbcError> {
        let mut client = self.client.clone();
        let resp = client
            .get_running_config(GetRunningConfigRequest {})
            .await
            .map_err(classify)?;
        Ok(resp.into_inner().blob)
    }

    async fn get_session(&self, ip_address: &str) -> Result<SessionSnapshot, SbcError> {
        let mut client = self.client.clone();
        let resp = client
            .get_session(GetSessionRequest {
                ip_address: ip_address.to_string(),
            })
            .await
            .map_err(classify)?
            .into_inner();

        Ok(SessionSnapshot {
            state: resp.state,
            uptime_seconds: resp.uptime_seconds,
            prefixes_received: resp.prefixes_received,
            prefixes_sent: resp.prefixes_sent,
            messages_received: resp.messages_received,
            messages_sent: resp.messages_sent,
            last_error: resp.last_error,
        })
    }
}
