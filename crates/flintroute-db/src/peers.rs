//! BGP peer (declarative model) queries. Sole writer is `flintroute-peer`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flintroute_schemas::BgpPeer;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewPeer {
    pub id: Uuid,
    pub ip_address: String,
    pub local_asn: i64,
    pub remote_asn: i64,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
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

/// Partial-update patch: `None` means "leave unchanged". Modeled as an
/// explicit struct of optional fields rather than a dynamic map so
/// validation stays type-checked instead of keyed off a loose map.
#[derive(Debug, Clone, Default)]
pub struct PeerPatch {
    pub local_asn: Option<i64>,
    pub remote_asn: Option<i64>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub password: Option<Option<String>>,
    pub multihop: Option<Option<i32>>,
    pub update_source: Option<Option<String>>,
    pub route_map_in: Option<Option<String>>,
    pub route_map_out: Option<Option<String>>,
    pub prefix_list_in: Option<Option<String>>,
    pub prefix_list_out: Option<Option<String>>,
    pub max_prefixes: Option<Option<i32>>,
    pub local_preference: Option<Option<i32>>,
}

/// Error raised inserting a peer whose `ip_address` collides with an
/// existing row. The caller's own pre-check (`find_by_ip`) is racy
/// under concurrent creates of the same ip, so this is the backstop
/// that turns a lost race into a typed conflict instead of a bare
/// database error.
#[derive(Debug, thiserror::Error)]
pub enum InsertPeerError {
    #[error("a peer with ip {0} already exists")]
    DuplicateIp(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub async fn insert(pool: &PgPool, peer: &NewPeer) -> Result<BgpPeer, InsertPeerError> {
    let result = sqlx::query_as::<_, PeerRow>(
        r#"
        insert into bgp_peers (
            id, ip_address, local_asn, remote_asn, name, description, enabled,
            password, multihop, update_source, route_map_in, route_map_out,
            prefix_list_in, prefix_list_out, max_prefixes, local_preference
        ) values (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
        )
        returning *
        "#,
    )
    .bind(peer.id)
    .bind(&peer.ip_address)
    .bind(peer.local_asn)
    .bind(peer.remote_asn)
    .bind(&peer.name)
    .bind(&peer.description)
    .bind(peer.enabled)
    .bind(&peer.password)
    .bind(peer.multihop)
    .bind(&peer.update_source)
    .bind(&peer.route_map_in)
    .bind(&peer.route_map_out)
    .bind(&peer.prefix_list_in)
    .bind(&peer.prefix_list_out)
    .bind(peer.max_prefixes)
    .bind(peer.local_preference)
    .fetch_one(pool)
    .await;

    match result {
        Ok(row) => Ok(row.into()),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            Err(InsertPeerError::DuplicateIp(peer.ip_address.clone()))
        }
        Err(e) => Err(InsertPeerError::Other(anyhow::Error::new(e).context("insert peer failed"))),
    }
}

pub async fn update(pool: &PgPool, id: Uuid, patch: &PeerPatch) -> Result<Option<BgpPeer>> {
    // Read-modify-write rather than a dynamic SET clause builder: the
    // patch struct is small and fixed, and the coordinator's per-peer
    // lock already serializes the read/write pair for a given row.
    let Some(existing) = get(pool, id).await? else {
        return Ok(None);
    };

    let local_asn = patch.local_asn.unwrap_or(existing.local_asn);
    let remote_asn = patch.remote_asn.unwrap_or(existing.remote_asn);
    let name = patch.name.clone().unwrap_or(existing.name);
    let description = patch
        .description
        .clone()
        .unwrap_or(existing.description);
    let enabled = patch.enabled.unwrap_or(existing.enabled);
    let password = patch.password.clone().unwrap_or(existing.password);
    let multihop = patch.multihop.unwrap_or(existing.multihop);
    let update_source = patch
        .update_source
        .clone()
        .unwrap_or(existing.update_source);
    let route_map_in = patch
        .route_map_in
        .clone()
        .unwrap_or(existing.route_map_in);
    let route_map_out = patch
        .route_map_out
        .clone()
        .unwrap_or(existing.route_map_out);
    let prefix_list_in = patch
        .prefix_list_in
        .clone()
        .unwrap_or(existing.prefix_list_in);
    let prefix_list_out = patch
        .prefix_list_out
        .clone()
        .unwrap_or(existing.prefix_list_out);
    let max_prefixes = patch.max_prefixes.unwrap_or(existing.max_prefixes);
    let local_preference = patch
        .local_preference
        .unwrap_or(existing.local_preference);

    let row = sqlx::query_as::<_, PeerRow>(
        r#"
        update bgp_peers set
            local_asn = $2, remote_asn = $3, name = $4, description = $5,
            enabled = $6, password = $7, multihop = $8, update_source = $9,
            route_map_in = $10, route_map_out = $11, prefix_list_in = $12,
            prefix_list_out = $13, max_prefixes = $14, local_preference = $15,
            updated_at = now()
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(local_asn)
    .bind(remote_asn)
    .bind(&name)
    .bind(&description)
    .bind(enabled)
    .bind(&password)
    .bind(multihop)
    .bind(&update_source)
    .bind(&route_map_in)
    .bind(&route_map_out)
    .bind(&prefix_list_in)
    .bind(&prefix_list_out)
    .bind(max_prefixes)
    .bind(local_preference)
    .fetch_one(pool)
    .await
    .context("update peer failed")?;

    Ok(Some(row.into()))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("delete from bgp_peers where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("delete peer failed")?;

    Ok(result.rows_affected() > 0)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<BgpPeer>> {
    let row = sqlx::query_as::<_, PeerRow>("select * from bgp_peers where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get peer failed")?;

    Ok(row.map(Into::into))
}

pub async fn find_by_ip(pool: &PgPool, ip_address: &str) -> Result<Option<BgpPeer>> {
    let row = sqlx::query_as::<_, PeerRow>("select * from bgp_peers where ip_address = $1")
        .bind(ip_address)
        .fetch_optional(pool)
        .await
        .context("find_by_ip failed")?;

    Ok(row.map(Into::into))
}

/// Snapshot of all peers, ordered by creation (used by the monitor's
/// tick-start read and by `GET /bgp/peers`).
pub async fn list(pool: &PgPool) -> Result<Vec<BgpPeer>> {
    let rows = sqlx::query_as::<_, PeerRow>("select * from bgp_peers order by created_at asc")
        .fetch_all(pool)
        .await
        .context("list peers failed")?;

    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(sqlx::FromRow)]
struct PeerRow {
    id: Uuid,
    ip_address: String,
    local_asn: i64,
    remote_asn: i64,
    name: String,
    description: Option<String>,
    enabled: bool,
    password: Option<String>,
    multihop: Option<i32>,
    update_source: Option<String>,
    route_map_in: Option<String>,
    route_map_out: Option<String>,
    prefix_list_in: Option<String>,
    prefix_list_out: Option<String>,
    max_prefixes: Option<i32>,
    local_preference: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PeerRow> for BgpPeer {
    fn from(r: PeerRow) -> Self {
        BgpPeer {
            id: r.id,
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
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
