//! Persistence layer. Raw `sqlx` queries, one function per
//! operation — no repository trait. Migrations are embedded and run
//! at startup.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod alerts;
pub mod peers;
pub mod sessions;
pub mod snapshots;
pub mod users;

pub const ENV_DB_URL: &str = "FLINTROUTE_DATABASE_URL";
const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";
const BOOTSTRAP_ADMIN_PASSWORD: &str = "admin";

/// Connect to Postgres using the given DSN.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")
}

/// Create the bootstrap administrator (`admin`/`admin`) iff no users
/// exist yet. Idempotent: a populated install is left untouched.
pub async fn bootstrap_admin_if_empty(pool: &PgPool) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as("select count(*)::bigint from users")
        .fetch_one(pool)
        .await
        .context("count users failed")?;

    if count > 0 {
        return Ok(false);
    }

    let hash = bcrypt::hash(BOOTSTRAP_ADMIN_PASSWORD, bcrypt::DEFAULT_COST)
        .context("hash bootstrap admin password")?;

    users::insert(
        pool,
        &users::NewUser {
            id: uuid::Uuid::new_v4(),
            username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            password_hash: hash,
            email: "admin@localhost".to_string(),
            role: flintroute_schemas::Role::Admin,
        },
    )
    .await
    .context("insert bootstrap admin failed")?;

    tracing::warn!("bootstrap administrator created: username=admin password=admin — change it");
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_users_table: bool,
}

/// Connectivity + schema-presence check, used by `GET /health`.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'users'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_users_table: exists,
    })
}
