//! flintroute-server entry point.
//!
//! Thin by design: load config, build
//! shared state, wire middleware, start the HTTP server, and forward
//! Ctrl-C into a cooperative shutdown of both the monitor task and the
//! axum listener.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use flintroute_server::{routes, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    let cfg = flintroute_config::load_from_env().context("load configuration")?;
    init_tracing(&cfg.log_level, &cfg.log_format);

    let pool = flintroute_db::connect(&cfg.database.path)
        .await
        .context("connect to database")?;
    flintroute_db::migrate(&pool).await.context("run migrations")?;
    flintroute_db::bootstrap_admin_if_empty(&pool)
        .await
        .context("bootstrap admin")?;

    // One lazily-connecting gRPC channel, shared by the REST surface
    // and the session monitor, so both see one connection-state view
    // of the FRR sidecar.
    let sbc = state::build_sbc(&cfg).context("build southbound client")?;

    let app_state = state::AppState::new(&cfg, pool.clone(), sbc.clone())
        .await
        .context("build application state")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    state::spawn_monitor(&cfg, pool, sbc, app_state.events.clone(), cancel_rx);

    let app = routes::build_router(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&cfg.cors.allowed_origins));

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("parse server.host/server.port into a socket address")?;

    info!("flintroute-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_tx))
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing(log_level: &str, log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log_format.eq_ignore_ascii_case("json") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new().allow_origin(AllowOrigin::any());
    }

    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Waits for Ctrl-C, flips the monitor's cancellation flag, then lets
/// `axum::serve` drain in-flight requests before returning.
async fn shutdown_signal(cancel_tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, cancelling session monitor");
    let _ = cancel_tx.send(true);
}
