//! Shared runtime state for flintroute-server.
//!
//! All types here are `Clone`-able (via `Arc`); handlers receive
//! `State<Arc<AppState>>` from Axum.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tonic::transport::Channel;

use flintroute_auth::AuthService;
use flintroute_config::Config;
use flintroute_events::EventBus;
use flintroute_monitor::SessionMonitor;
use flintroute_peer::PeerCoordinator;
use flintroute_sbc::{grpc::GrpcSbc, SouthboundClient};
use flintroute_snapshot::SnapshotStore;
use flintroute_ws::Hub;

#[derive(Clone)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

pub struct AppState {
    pub pool: PgPool,
    pub auth: AuthService,
    pub events: EventBus,
    pub hub: Arc<Hub>,
    pub peers: Arc<PeerCoordinator>,
    pub snapshots: Arc<SnapshotStore>,
    pub build: BuildInfo,
}

impl AppState {
    pub async fn new(cfg: &Config, pool: PgPool, sbc: Arc<dyn SouthboundClient>) -> Result<Arc<Self>> {
        let events = EventBus::new();

        let auth = AuthService::new(
            pool.clone(),
            cfg.auth.jwt_secret.clone(),
            cfg.auth.token_expiry,
            cfg.auth.refresh_expiry,
        );

        let peers = Arc::new(PeerCoordinator::new(pool.clone(), sbc.clone(), events.clone()));

        let snapshots = Arc::new(
            SnapshotStore::new(pool.clone(), sbc.clone(), "data/provenance.jsonl")
                .context("construct snapshot store")?,
        );

        let hub = Arc::new(Hub::new());
        hub.clone().spawn_fanout(events.clone());

        Ok(Arc::new(AppState {
            pool,
            auth,
            events,
            hub,
            peers,
            snapshots,
            build: BuildInfo {
                service: "flintroute-server",
                version: env!("CARGO_PKG_VERSION"),
            },
        }))
    }
}

pub fn spawn_monitor(
    cfg: &Config,
    pool: PgPool,
    sbc: Arc<dyn SouthboundClient>,
    events: EventBus,
    cancel: tokio::sync::watch::Receiver<bool>,
) {
    let monitor = SessionMonitor::new(
        pool,
        sbc,
        events,
        Duration::from_secs(cfg.monitor.poll_interval_secs),
        cfg.monitor.reconcile_drift,
    );
    tokio::spawn(monitor.run(cancel));
}

/// A single lazily-connecting gRPC channel shared by every component
/// that talks to the FRR sidecar, so the whole daemon sees one
/// connection-state view of it.
pub fn build_sbc(cfg: &Config) -> Result<Arc<dyn SouthboundClient>> {
    let uri = format!("http://{}:{}", cfg.frr.grpc_host, cfg.frr.grpc_port);
    let channel = Channel::from_shared(uri)
        .context("invalid frr grpc endpoint")?
        .connect_lazy();
    Ok(Arc::new(GrpcSbc::new(channel)))
}
