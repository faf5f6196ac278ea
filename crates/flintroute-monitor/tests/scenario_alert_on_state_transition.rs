//! Scenario: a peer's observed session crossing into/out of
//! `Established` raises exactly one alert per edge. Drives the real
//! `SessionMonitor::run` loop
//! against a migrated Postgres test database and the deterministic
//! mock southbound client, reprogramming the mock's session snapshot
//! between ticks the way FRR's state would actually change underneath
//! the poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use flintroute_db::peers::{self, NewPeer};
use flintroute_events::EventBus;
use flintroute_monitor::SessionMonitor;
use flintroute_sbc::SessionSnapshot;
use flintroute_schemas::{AlertType, SessionState, Severity};

fn snapshot(state: &str) -> SessionSnapshot {
    SessionSnapshot {
        state: state.to_string(),
        uptime_seconds: 0,
        prefixes_received: 0,
        prefixes_sent: 0,
        messages_received: 0,
        messages_sent: 0,
        last_error: None,
    }
}

#[tokio::test]
async fn peer_up_then_peer_down_alerts_are_derived_from_edges() {
    let Ok(pool) = flintroute_testkit::test_pool().await else { return };
    let sbc = flintroute_testkit::mock_sbc();

    let peer = peers::insert(
        &pool,
        &NewPeer {
            id: Uuid::new_v4(),
            ip_address: "203.0.113.5".to_string(),
            local_asn: 65010,
            remote_asn: 65011,
            name: "scenario-peer".to_string(),
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
        },
    )
    .await
    .expect("insert fixture peer");

    sbc.set_session(&peer.ip_address, snapshot("Idle"));

    let events = EventBus::new();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let monitor = SessionMonitor::new(
        pool.clone(),
        sbc.clone() as Arc<dyn flintroute_sbc::SouthboundClient>,
        events,
        Duration::from_millis(20),
        false,
    );
    let handle = tokio::spawn(monitor.run(cancel_rx));

    // First tick observes the Idle baseline; no prior state, no alert.
    tokio::time::sleep(Duration::from_millis(60)).await;

    sbc.set_session(&peer.ip_address, snapshot("Established"));
    tokio::time::sleep(Duration::from_millis(80)).await;

    sbc.set_session(&peer.ip_address, snapshot("Idle"));
    tokio::time::sleep(Duration::from_millis(80)).await;

    let _ = cancel_tx.send(true);
    let _ = handle.await;

    let session = flintroute_db::sessions::get_by_peer(&pool, peer.id)
        .await
        .expect("query session")
        .expect("session row exists");
    assert_eq!(session.state, SessionState::Idle);

    let alerts = flintroute_db::alerts::list(&pool, &Default::default())
        .await
        .expect("list alerts");
    let peer_alerts: Vec<_> = alerts.iter().filter(|a| a.peer_id == Some(peer.id)).collect();

    let up_count = peer_alerts.iter().filter(|a| a.alert_type == AlertType::PeerUp).count();
    let down_count = peer_alerts.iter().filter(|a| a.alert_type == AlertType::PeerDown).count();
    assert_eq!(up_count, 1, "exactly one peer_up alert expected");
    assert_eq!(down_count, 1, "exactly one peer_down alert expected");

    let down_alert = peer_alerts
        .iter()
        .find(|a| a.alert_type == AlertType::PeerDown)
        .unwrap();
    assert_eq!(down_alert.severity, Severity::Warning);
    assert!(down_alert.message.contains("scenario-peer"));
    assert!(down_alert.message.contains("Established"));
    assert!(down_alert.message.contains("Idle"));
}
