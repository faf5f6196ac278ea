//! Config snapshot (`ConfigVersion`) queries. Sole writer is
//! `flintroute-snapshot`; append-only, unique by hash.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flintroute_schemas::ConfigVersion;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn find_by_hash(pool: &PgPool, hash: &str) -> Result<Option<ConfigVersion>> {
    let row = sqlx::query_as::<_, VersionRow>("select * from config_versions where hash = $1")
        .bind(hash)
        .fetch_optional(pool)
        .await
        .context("find_by_hash failed")?;

    Ok(row.map(Into::into))
}

pub async fn insert(
    pool: &PgPool,
    id: Uuid,
    description: Option<&str>,
    config_blob: &str,
    hash: &str,
    creator_id: Uuid,
) -> Result<ConfigVersion> {
    let row = sqlx::query_as::<_, VersionRow>(
        r#"
        insert into config_versions (id, description, config_blob, hash, creator_id)
        values ($1, $2, $3, $4, $5)
        returning *
        "#,
    )
    .bind(id)
    .bind(description)
    .bind(config_blob)
    .bind(hash)
    .bind(creator_id)
    .fetch_one(pool)
    .await
    .context("insert config_version failed")?;

    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<ConfigVersion>> {
    let row = sqlx::query_as::<_, VersionRow>("select * from config_versions where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get config_version failed")?;

    Ok(row.map(Into::into))
}

/// Newest first.
pub async fn list(pool: &PgPool) -> Result<Vec<ConfigVersion>> {
    let rows = sqlx::query_as::<_, VersionRow>(
        "select * from config_versions order by created_at desc",
    )
    .fetch_all(pool)
    .await
    .context("list config_versions failed")?;

    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    description: Option<String>,
    config_blob: String,
    hash: String,
    creator_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<VersionRow> for ConfigVersion {
    fn from(r: VersionRow) -> Self {
        ConfigVersion {
            id: r.id,
            description: r.description,
            config_blob: r.config_blob,
            hash: r.hash,
            creator_id: r.creator_id,
            created_at: r.created_at,
        }
    }
}
