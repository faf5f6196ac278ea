//! Axum router and all HTTP/WebSocket handlers for flintroute-server.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers, keeping router construction separate
//! from middleware.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use flintroute_schemas::Severity;

use crate::auth::{authorize, ANY_ROLE, OPERATOR_UP};
use crate::dto::{
    AcknowledgeActor, AlertListQuery, AuthResponse, BackupRequest, CreatePeerRequest,
    HealthResponse, LoginRequest, OkResponse, RefreshRequest, UpdatePeerRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/bgp/peers", get(list_peers).post(create_peer))
        .route(
            "/api/v1/bgp/peers/:id",
            get(get_peer).put(update_peer).delete(delete_peer),
        )
        .route("/api/v1/bgp/sessions", get(list_sessions))
        .route("/api/v1/bgp/sessions/:id", get(get_session))
        .route("/api/v1/config/versions", get(list_versions))
        .route("/api/v1/config/backup", post(backup))
        .route("/api/v1/config/restore/:id", post(restore))
        .route("/api/v1/alerts", get(list_alerts))
        .route("/api/v1/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/api/v1/ws", get(ws_upgrade))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let database_ok = flintroute_db::status(&st.pool).await.map(|s| s.ok).unwrap_or(false);

    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            database_ok,
        }),
    )
}

// ---------------------------------------------------------------------------
// Auth (IdA)
// ---------------------------------------------------------------------------

async fn login(
    State(st): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let success = st.auth.authenticate(&body.username, &body.password).await?;
    Ok(Json(AuthResponse {
        access_token: success.access_token,
        refresh_token: success.refresh_token,
        expires_in: success.expires_in,
        user: success.user,
    }))
}

async fn refresh(
    State(st): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let success = st.auth.refresh(&body.refresh_token).await?;
    Ok(Json(AuthResponse {
        access_token: success.access_token,
        refresh_token: success.refresh_token,
        expires_in: success.expires_in,
        user: success.user,
    }))
}

async fn logout(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, ApiError> {
    let claims = authorize(&st.auth, &headers, ANY_ROLE)?;
    st.auth.revoke_all(claims.sub).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// BGP peers (PC)
// ---------------------------------------------------------------------------

async fn list_peers(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, ANY_ROLE)?;
    let peers = st.peers.list().await?;
    Ok(Json(peers))
}

async fn create_peer(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePeerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, OPERATOR_UP)?;
    let peer = st.peers.create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(peer)))
}

async fn get_peer(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, ANY_ROLE)?;
    let peer = st.peers.get(id).await?;
    Ok(Json(peer))
}

async fn update_peer(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePeerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, OPERATOR_UP)?;
    let peer = st.peers.update(id, body.into()).await?;
    Ok(Json(peer))
}

async fn delete_peer(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, OPERATOR_UP)?;
    st.peers.delete(id).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// BGP sessions (read-only projection of PS's observed state)
// ---------------------------------------------------------------------------

async fn list_sessions(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, ANY_ROLE)?;
    let sessions = flintroute_db::sessions::list(&st.pool).await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, ANY_ROLE)?;
    let session = flintroute_db::sessions::get(&st.pool, id)
        .await?
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "session not found".to_string()))?;
    Ok(Json(session))
}

// ---------------------------------------------------------------------------
// Config snapshots (SS)
// ---------------------------------------------------------------------------

async fn list_versions(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, ANY_ROLE)?;
    let versions = st.snapshots.list().await?;
    Ok(Json(versions))
}

async fn backup(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BackupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&st.auth, &headers, OPERATOR_UP)?;
    let version = st
        .snapshots
        .capture(body.description.as_deref(), claims.sub)
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

async fn restore(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&st.auth, &headers, OPERATOR_UP)?;
    let version = st.snapshots.restore(id, claims.sub).await?;
    Ok(Json(version))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

async fn list_alerts(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AlertListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&st.auth, &headers, ANY_ROLE)?;

    let severity = match query.severity.as_deref() {
        Some("info") => Some(Severity::Info),
        Some("warning") => Some(Severity::Warning),
        Some("critical") => Some(Severity::Critical),
        Some(other) => {
            return Err(ApiError(
                StatusCode::BAD_REQUEST,
                format!("unknown severity '{other}'"),
            ))
        }
        None => None,
    };

    let filter = flintroute_db::alerts::AlertFilter {
        acknowledged: query.acknowledged,
        severity,
    };
    let alerts = flintroute_db::alerts::list(&st.pool, &filter).await?;
    Ok(Json(alerts))
}

async fn acknowledge_alert(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<AcknowledgeActor>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&st.auth, &headers, OPERATOR_UP)?;
    let actor = body.and_then(|Json(b)| b.actor).unwrap_or(claims.sub);

    let alert = flintroute_db::alerts::acknowledge(&st.pool, id, actor)
        .await?
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "alert not found".to_string()))?;
    Ok(Json(alert))
}

// ---------------------------------------------------------------------------
// WebSocket Hub (WSH)
// ---------------------------------------------------------------------------

async fn ws_upgrade(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Auth happens at upgrade time: a bad/missing token never reaches
    // the socket layer.
    crate::auth::authorize_ws(&st.auth, &headers, query.token.as_deref(), ANY_ROLE)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, st)))
}

#[derive(Debug, serde::Deserialize, Default)]
struct WsQuery {
    token: Option<String>,
}

async fn handle_socket(socket: WebSocket, st: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut rx) = st.hub.attach();

    let mut ping_interval = tokio::time::interval(flintroute_ws::DEFAULT_PING_INTERVAL);
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let Ok(text) = serde_json::to_string(&envelope) else { continue };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > flintroute_ws::DEFAULT_PONG_TIMEOUT {
                    tracing::info!(subscriber = %id, "ws subscriber missed pong, closing");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => last_pong = tokio::time::Instant::now(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    st.hub.detach(id);
}
