//! Shared scenario-test fixtures: a migrated Postgres pool, a
//! deterministic mock southbound client, and JWT fixtures.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use sqlx::PgPool;
use uuid::Uuid;

use flintroute_auth::Claims;
use flintroute_schemas::Role;

pub const TEST_JWT_SECRET: &str = "flintroute-testkit-fixed-secret";

/// Env var naming the Postgres DSN scenario tests run against. Left
/// unset, `test_pool` fails fast with a clear message rather than
/// silently falling back to a dev database.
pub const ENV_TEST_DATABASE_URL: &str = "FLINTROUTE_TEST_DATABASE_URL";

/// Connect to the scenario-test database, run migrations, and truncate
/// every application table so each test starts from empty. Tables are
/// listed in FK-safe order (children before `users`/`bgp_peers`).
pub async fn test_pool() -> Result<PgPool> {
    let url = std::env::var(ENV_TEST_DATABASE_URL).with_context(|| {
        format!("{ENV_TEST_DATABASE_URL} must be set to run flintroute scenario tests")
    })?;

    let pool = flintroute_db::connect(&url).await?;
    flintroute_db::migrate(&pool).await?;
    truncate_all(&pool).await?;
    Ok(pool)
}

async fn truncate_all(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "truncate table alerts, bgp_sessions, config_versions, refresh_credentials, bgp_peers, users restart identity cascade",
    )
    .execute(pool)
    .await
    .context("truncate scenario-test tables")?;
    Ok(())
}

/// A fresh deterministic mock SBC, wrapped the way production code
/// receives it (`Arc<dyn SouthboundClient>`).
pub fn mock_sbc() -> Arc<flintroute_sbc::mock::MockSbc> {
    Arc::new(flintroute_sbc::mock::MockSbc::new())
}

/// Insert a user directly (bypassing the HTTP signup surface, which
/// this spec does not expose — users are provisioned by an
/// administrator) and return its id.
pub async fn insert_user(pool: &PgPool, username: &str, password: &str, role: Role) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).context("hash test user password")?;
    flintroute_db::users::insert(
        pool,
        &flintroute_db::users::NewUser {
            id,
            username: username.to_string(),
            password_hash: hash,
            email: format!("{username}@example.test"),
            role,
        },
    )
    .await?;
    Ok(id)
}

/// Mint a bearer token without going through `AuthService::authenticate`,
/// for tests that only need an already-authenticated caller. Signed with
/// [`TEST_JWT_SECRET`] — `AuthService` under test must be constructed with
/// the same secret.
pub fn mint_test_token(sub: Uuid, role: Role) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub,
        role,
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("encoding a fixture JWT must not fail")
}
