//! BGP session (observed state) queries. Sole writer is `flintroute-monitor`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flintroute_schemas::{BgpSession, SessionState};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ObservedSession {
    pub state: SessionState,
    pub uptime_seconds: i64,
    pub prefixes_received: i64,
    pub prefixes_sent: i64,
    pub messages_received: i64,
    pub messages_sent: i64,
    pub last_error: Option<String>,
}

pub async fn get_by_peer(pool: &PgPool, peer_id: Uuid) -> Result<Option<BgpSession>> {
    let row = sqlx::query_as::<_, SessionRow>("select * from bgp_sessions where peer_id = $1")
        .bind(peer_id)
        .fetch_optional(pool)
        .await
        .context("get_by_peer failed")?;

    Ok(row.map(Into::into))
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<BgpSession>> {
    let row = sqlx::query_as::<_, SessionRow>("select * from bgp_sessions where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get session failed")?;

    Ok(row.map(Into::into))
}

pub async fn list(pool: &PgPool) -> Result<Vec<BgpSession>> {
    let rows = sqlx::query_as::<_, SessionRow>("select * from bgp_sessions order by updated_at desc")
        .fetch_all(pool)
        .await
        .context("list sessions failed")?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Error raised when the peer backing an upsert no longer exists —
/// the caller (monitor) must treat this as "peer deleted concurrently,
/// drop silently", not as an `Internal` error.
#[derive(Debug, thiserror::Error)]
pub enum UpsertSessionError {
    #[error("peer {0} no longer exists")]
    PeerGone(Uuid),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Insert-or-update the session row for `peer_id`, returning the
/// previous state (`None` if this is the first observation) and the
/// new row.
///
/// Foreign-key violation on insert (23503) is mapped to
/// [`UpsertSessionError::PeerGone`]; every other error propagates.
pub async fn upsert(
    pool: &PgPool,
    peer_id: Uuid,
    observed: &ObservedSession,
) -> Result<(Option<SessionState>, BgpSession), UpsertSessionError> {
    let previous = get_by_peer(pool, peer_id)
        .await
        .map_err(UpsertSessionError::Other)?
        .map(|s| s.state);

    let result = sqlx::query_as::<_, SessionRow>(
        r#"
        insert into bgp_sessions (
            id, peer_id, state, uptime_seconds, prefixes_received, prefixes_sent,
            messages_received, messages_sent, last_error, updated_at
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        on conflict (peer_id) do update set
            state = excluded.state,
            uptime_seconds = excluded.uptime_seconds,
            prefixes_received = excluded.prefixes_received,
            prefixes_sent = excluded.prefixes_sent,
            messages_received = excluded.messages_received,
            messages_sent = excluded.messages_sent,
            last_error = excluded.last_error,
            updated_at = now()
        returning *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(peer_id)
    .bind(observed.state.as_str())
    .bind(observed.uptime_seconds)
    .bind(observed.prefixes_received)
    .bind(observed.prefixes_sent)
    .bind(observed.messages_received)
    .bind(observed.messages_sent)
    .bind(&observed.last_error)
    .fetch_one(pool)
    .await;

    match result {
        Ok(row) => Ok((previous, row.into())),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23503") => {
            Err(UpsertSessionError::PeerGone(peer_id))
        }
        Err(e) => Err(UpsertSessionError::Other(anyhow::Error::new(e).context("upsert session failed"))),
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    peer_id: Uuid,
    state: String,
    uptime_seconds: i64,
    prefixes_received: i64,
    prefixes_sent: i64,
    messages_received: i64,
    messages_sent: i64,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for BgpSession {
    fn from(r: SessionRow) -> Self {
        BgpSession {
            id: r.id,
            peer_id: r.peer_id,
            state: r.state.parse().unwrap_or(SessionState::Idle),
            uptime_seconds: r.uptime_seconds,
            prefixes_received: r.prefixes_received,
            prefixes_sent: r.prefixes_sent,
            messages_received: r.messages_received,
            messages_sent: r.messages_sent,
            last_error: r.last_error,
            updated_at: r.updated_at,
        }
    }
}
