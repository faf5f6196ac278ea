//! Session monitor.
//!
//! A single-threaded polling loop: a `tokio::time::interval` raced
//! against a cancellation signal inside `tokio::select!`.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use flintroute_db::alerts::{self};
use flintroute_db::peers;
use flintroute_db::sessions::{self, ObservedSession, UpsertSessionError};
use flintroute_events::EventBus;
use flintroute_schemas::{
    AlertProjection, AlertType, BgpPeer, DomainEvent, SessionProjection, SessionState, Severity,
};
use flintroute_sbc::{SbcError, SouthboundClient};

pub struct SessionMonitor {
    pool: PgPool,
    sbc: Arc<dyn SouthboundClient>,
    events: EventBus,
    period: Duration,
    reconcile_drift: bool,
}

impl SessionMonitor {
    pub fn new(
        pool: PgPool,
        sbc: Arc<dyn SouthboundClient>,
        events: EventBus,
        period: Duration,
        reconcile_drift: bool,
    ) -> Self {
        SessionMonitor {
            pool,
            sbc,
            events,
            period,
            reconcile_drift,
        }
    }

    /// Runs until `cancel` is set to `true`. Checked both between ticks
    /// and between per-peer iterations within a tick.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *cancel.borrow() {
                        return;
                    }
                    self.tick(&cancel).await;
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&self, cancel: &watch::Receiver<bool>) {
        let snapshot = match peers::list(&self.pool).await {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "monitor: failed to list peers for this tick");
                return;
            }
        };

        for peer in &snapshot {
            if *cancel.borrow() {
                return;
            }
            if !peer.enabled {
                continue;
            }
            self.poll_one(peer).await;
        }

        if self.reconcile_drift {
            self.reconcile_tick(&snapshot).await;
        }
    }

    async fn poll_one(&self, peer: &BgpPeer) {
        let observed = match self.sbc.get_session(&peer.ip_address).await {
            Ok(snap) => snap,
            Err(SbcError::Transient(_)) | Err(SbcError::PeerUnknown(_)) => return,
            Err(SbcError::Permanent(err)) => {
                tracing::warn!(peer_id = %peer.id, ip = %peer.ip_address, error = %err, "get_session rejected outright");
                return;
            }
        };

        let state = observed
            .state
            .parse::<SessionState>()
            .unwrap_or(SessionState::Idle);

        let record = ObservedSession {
            state,
            uptime_seconds: observed.uptime_seconds,
            prefixes_received: observed.prefixes_received,
            prefixes_sent: observed.prefixes_sent,
            messages_received: observed.messages_received,
            messages_sent: observed.messages_sent,
            last_error: observed.last_error,
        };

        let (old_state, session) = match sessions::upsert(&self.pool, peer.id, &record).await {
            Ok(pair) => pair,
            Err(UpsertSessionError::PeerGone(_)) => return,
            Err(UpsertSessionError::Other(err)) => {
                tracing::warn!(peer_id = %peer.id, error = %err, "session upsert failed");
                return;
            }
        };

        if old_state == Some(session.state) {
            return;
        }

        self.events.publish(DomainEvent::SessionUpdate(SessionProjection {
            session: session.clone(),
            peer: peer.clone(),
        }));

        let was_established = old_state == Some(SessionState::Established);
        let is_established = session.state == SessionState::Established;

        let transition = if !was_established && is_established {
            Some((AlertType::PeerUp, Severity::Info))
        } else if was_established && !is_established {
            Some((AlertType::PeerDown, Severity::Warning))
        } else {
            None
        };

        let Some((alert_type, severity)) = transition else {
            return;
        };

        let old_label = old_state.map(|s| s.as_str()).unwrap_or("unknown");
        let message = format!(
            "BGP peer {} ({}) state changed from {} to {}",
            peer.name,
            peer.ip_address,
            old_label,
            session.state.as_str()
        );

        match alerts::insert(&self.pool, Uuid::new_v4(), alert_type, severity, &message, Some(peer.id)).await {
            Ok(alert) => {
                self.events.publish(DomainEvent::Alert(AlertProjection {
                    alert,
                    peer: Some(peer.clone()),
                }));
            }
            Err(err) => {
                tracing::warn!(peer_id = %peer.id, error = %err, "alert insert failed");
            }
        }
    }

    /// Re-declares every enabled peer to the southbound client. Covers
    /// the convergence case: a create/update whose southbound call
    /// failed non-fatally leaves the peer "declared but not applied" until a
    /// later tick re-asserts it. `add_peer` is documented idempotent,
    /// so re-asserting an already-applied peer is a no-op downstream.
    async fn reconcile_tick(&self, snapshot: &[BgpPeer]) {
        for peer in snapshot.iter().filter(|p| p.enabled) {
            if let Err(err) = self.sbc.add_peer(&flintroute_sbc::PeerSpec::from(peer)).await {
                tracing::warn!(peer_id = %peer.id, ip = %peer.ip_address, error = %err, "drift reconciliation re-assert failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintroute_sbc::mock::MockSbc;
    use flintroute_sbc::SessionSnapshot;

    fn sample_peer() -> BgpPeer {
        BgpPeer {
            id: Uuid::new_v4(),
            ip_address: "192.0.2.1".to_string(),
            local_asn: 65000,
            remote_asn: 65001,
            name: "edge-1".to_string(),
            description: None,
            enabled: true,
            password: None,
            multihop: None,
            update_source: None,
            route_map_in: None,
            route_map_out: None,
            prefix_list_in: None,
            prefix_list_out: None,
            max_prefixes: None,
            local_preference: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn message_format_matches_spec() {
        let peer = sample_peer();
        let msg = format!(
            "BGP peer {} ({}) state changed from {} to {}",
            peer.name,
            peer.ip_address,
            "Idle",
            "Established"
        );
        assert_eq!(
            msg,
            "BGP peer edge-1 (192.0.2.1) state changed from Idle to Established"
        );
    }

    #[tokio::test]
    async fn mock_sbc_reports_peer_unknown_is_skippable() {
        let sbc = MockSbc::new();
        let err = sbc.get_session("192.0.2.1").await.unwrap_err();
        assert!(matches!(err, SbcError::PeerUnknown(_)));
        let _ = SessionSnapshot {
            state: "Idle".to_string(),
            uptime_seconds: 0,
            prefixes_received: 0,
            prefixes_sent: 0,
            messages_received: 0,
            messages_sent: 0,
            last_error: None,
        };
    }
}
