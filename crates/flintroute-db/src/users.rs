//! User and refresh-credential queries.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flintroute_schemas::{RefreshCredential, Role, User};
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
}

pub async fn insert(pool: &PgPool, user: &NewUser) -> Result<()> {
    sqlx::query(
        r#"
        insert into users (id, username, password_hash, email, role, active)
        values ($1, $2, $3, $4, $5, true)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.email)
    .bind(user.role.as_str())
    .execute(pool)
    .await
    .context("insert user failed")?;

    Ok(())
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        select id, username, password_hash, email, role, active, created_at, updated_at
        from users where username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("find_by_username failed")?;

    Ok(row.map(Into::into))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        select id, username, password_hash, email, role, active, created_at, updated_at
        from users where id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("find_by_id failed")?;

    Ok(row.map(Into::into))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    email: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            email: r.email,
            role: r.role.parse().unwrap_or(Role::User),
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// -----------------------------------------------------------------------
// Refresh credentials
// -----------------------------------------------------------------------

pub async fn insert_refresh_credential(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into refresh_credentials (id, user_id, token, expires_at, revoked)
        values ($1, $2, $3, $4, false)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("insert_refresh_credential failed")?;

    Ok(())
}

pub async fn find_refresh_credential_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<RefreshCredential>> {
    let row = sqlx::query_as::<_, RefreshRow>(
        r#"
        select id, user_id, token, expires_at, revoked, created_at
        from refresh_credentials where token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("find_refresh_credential_by_token failed")?;

    Ok(row.map(Into::into))
}

/// Revoke one credential row by id. Idempotent.
pub async fn revoke_refresh_credential(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("update refresh_credentials set revoked = true where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("revoke_refresh_credential failed")?;

    Ok(())
}

/// Revoke every non-revoked credential for `user_id`. Idempotent — a
/// second call is a no-op.
pub async fn revoke_all_refresh_credentials(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query("update refresh_credentials set revoked = true where user_id = $1 and revoked = false")
        .bind(user_id)
        .execute(pool)
        .await
        .context("revoke_all_refresh_credentials failed")?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct RefreshRow {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl From<RefreshRow> for RefreshCredential {
    fn from(r: RefreshRow) -> Self {
        RefreshCredential {
            id: r.id,
            user_id: r.user_id,
            token: r.token,
            expires_at: r.expires_at,
            revoked: r.revoked,
            created_at: r.created_at,
        }
    }
}
