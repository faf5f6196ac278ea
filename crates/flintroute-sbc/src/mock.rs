//! Deterministic in-memory FRR stand-in for tests.
//!
//! `BTreeMap`-keyed state (deterministic iteration), no RNG, no wall
//! clock, and every call is logged so a test can assert "the southbound
//! client saw `add_peer(192.0.2.1)`".

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{PeerSpec, SbcError, SessionSnapshot, SouthboundClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    AddPeer(String),
    UpdatePeer(String),
    RemovePeer(String),
}

#[derive(Default)]
struct MockState {
    declared_peers: BTreeMap<String, PeerSpec>,
    sessions: BTreeMap<String, SessionSnapshot>,
    running_config: String,
    calls: Vec<MockCall>,
    transient_failure: bool,
}

#[derive(Default)]
pub struct MockSbc {
    state: Mutex<MockState>,
}

impl MockSbc {
    pub fn new() -> Self {
        MockSbc::default()
    }

    /// Program the session snapshot `get_session(ip)` should return.
    pub fn set_session(&self, ip: impl Into<String>, snapshot: SessionSnapshot) {
        self.state.lock().unwrap().sessions.insert(ip.into(), snapshot);
    }

    pub fn set_running_config(&self, blob: impl Into<String>) {
        self.state.lock().unwrap().running_config = blob.into();
    }

    /// Force every subsequent call to fail `Transient`, simulating a
    /// daemon that is momentarily unreachable.
    pub fn set_transient_failure(&self, enabled: bool) {
        self.state.lock().unwrap().transient_failure = enabled;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn has_declared_peer(&self, ip: &str) -> bool {
        self.state.lock().unwrap().declared_peers.contains_key(ip)
    }

    pub fn declared_peer_count(&self) -> usize {
        self.state.lock().unwrap().declared_peers.len()
    }
}

#[async_trait]
impl SouthboundClient for MockSbc {
    async fn add_peer(&self, spec: &PeerSpec) -> Result<(), SbcError> {
        let mut s = self.state.lock().unwrap();
        if s.transient_failure {
            return Err(SbcError::Transient("mock sbc unreachable".to_string()));
        }
        s.calls.push(MockCall::AddPeer(spec.ip_address.clone()));
        s.declared_peers.insert(spec.ip_address.clone(), spec.clone());
        Ok(())
    }

    async fn update_peer(&self, spec: &PeerSpec) -> Result<(), SbcError> {
        let mut s = self.state.lock().unwrap();
        if s.transient_failure {
            return Err(SbcError::Transient("mock sbc unreachable".to_string()));
        }
        s.calls.push(MockCall::UpdatePeer(spec.ip_address.clone()));
        s.declared_peers.insert(spec.ip_address.clone(), spec.clone());
        Ok(())
    }

    /// Idempotent: succeeds whether or not the peer was declared, so the
    /// delete path never fails on a peer the daemon never learned about.
    async fn remove_peer(&self, ip_address: &str) -> Result<(), SbcError> {
        let mut s = self.state.lock().unwrap();
        if s.transient_failure {
            return Err(SbcError::Transient("mock sbc unreachable".to_string()));
        }
        s.calls.push(MockCall::RemovePeer(ip_address.to_string()));
        s.declared_peers.remove(ip_address);
        Ok(())
    }

    async fn get_running_config(&self) -> Result<String, SbcError> {
        let s = self.state.lock().unwrap();
        if s.transient_failure {
            return Err(SbcError::Transient("mock sbc unreachable".to_string()));
        }
        Ok(s.running_config.clone())
    }

    async fn get_session(&self, ip_address: &str) -> Result<SessionSnapshot, SbcError> {
        let s = self.state.lock().unwrap();
        if s.transient_failure {
            return Err(SbcError::Transient("mock sbc unreachable".to_string()));
        }
        s.sessions
            .get(ip_address)
            .cloned()
            .ok_or_else(|| SbcError::PeerUnknown(ip_address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_get_session_roundtrip() {
        let sbc = MockSbc::new();
        sbc.set_session(
            "192.0.2.1",
            SessionSnapshot {
                state: "Established".to_string(),
                uptime_seconds: 10,
                prefixes_received: 1,
                prefixes_sent: 1,
                messages_received: 5,
                messages_sent: 5,
                last_error: None,
            },
        );

        let spec = PeerSpec {
            ip_address: "192.0.2.1".to_string(),
            local_asn: 65000,
            remote_asn: 65001,
            password: None,
            multihop: None,
            update_source: None,
            route_map_in: None,
            route_map_out: None,
            prefix_list_in: None,
            prefix_list_out: None,
            max_prefixes: None,
            local_preference: None,
        };

        sbc.add_peer(&spec).await.unwrap();
        assert!(sbc.has_declared_peer("192.0.2.1"));
        assert_eq!(sbc.calls(), vec![MockCall::AddPeer("192.0.2.1".to_string())]);

        let snap = sbc.get_session("192.0.2.1").await.unwrap();
        assert_eq!(snap.state, "Established");
    }

    #[tokio::test]
    async fn get_session_unknown_peer() {
        let sbc = MockSbc::new();
        let err = sbc.get_session("192.0.2.9").await.unwrap_err();
        assert!(matches!(err, SbcError::PeerUnknown(_)));
    }

    #[tokio::test]
    async fn transient_failure_blocks_every_call() {
        let sbc = MockSbc::new();
        sbc.set_transient_failure(true);
        let err = sbc.remove_peer("192.0.2.1").await.unwrap_err();
        assert!(matches!(err, SbcError::Transient(_)));
    }

    #[tokio::test]
    async fn remove_peer_is_idempotent_on_unknown_ip() {
        let sbc = MockSbc::new();
        assert!(sbc.remove_peer("192.0.2.1").await.is_ok());
    }
}
