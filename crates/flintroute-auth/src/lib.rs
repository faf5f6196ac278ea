//! Identity and authorization.
//!
//! Password verification, access/refresh token mint+verify, refresh
//! rotation + revocation, role-gated request admission. A typed
//! `Claims` struct instead of a dynamic claim map, and one `thiserror`
//! enum at the crate boundary, follows the rest of the workspace's
//! style.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use flintroute_db as db;
use flintroute_schemas::{Role, User, UserProjection};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password. Deliberately the *same*
    /// variant for both cases so the client cannot distinguish
    /// "no such user" from "wrong password".
    #[error("invalid username or password")]
    AuthFailed,
    #[error("account disabled")]
    AccountDisabled,
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("caller's role is not permitted for this operation")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserProjection,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    secret: String,
    token_expiry: Duration,
    refresh_expiry: Duration,
}

impl AuthService {
    pub fn new(pool: PgPool, secret: impl Into<String>, token_expiry_secs: u64, refresh_expiry_secs: u64) -> Self {
        AuthService {
            pool,
            secret: secret.into(),
            token_expiry: Duration::seconds(token_expiry_secs as i64),
            refresh_expiry: Duration::seconds(refresh_expiry_secs as i64),
        }
    }

    /// Verify credentials and issue a token pair. The password hash is
    /// *always* computed — for an absent user, against a fixed precomputed
    /// dummy hash — so wall-clock timing does not leak whether the
    /// username exists. Active=false is checked only after the hash
    /// succeeds, so it never shortcuts the comparison.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AuthSuccess, AuthError> {
        let user = db::users::find_by_username(&self.pool, username)
            .await
            .map_err(AuthError::Internal)?;

        let (hash_to_check, user) = match &user {
            Some(u) => (u.password_hash.clone(), Some(u)),
            None => (dummy_hash().to_string(), None),
        };

        let verified = bcrypt::verify(password, &hash_to_check).unwrap_or(false);

        let user = match (verified, user) {
            (true, Some(u)) => u,
            _ => return Err(AuthError::AuthFailed),
        };

        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        self.issue(user).await
    }

    /// Exchange a refresh credential for a new token pair: verify it
    /// exists, is non-revoked, unexpired, and belongs to an active
    /// user; rotate on success.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSuccess, AuthError> {
        if !looks_like_token(refresh_token) {
            return Err(AuthError::AuthFailed);
        }

        let credential = db::users::find_refresh_credential_by_token(&self.pool, refresh_token)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::AuthFailed)?;

        if credential.revoked {
            return Err(AuthError::AuthFailed);
        }
        if credential.expires_at < Utc::now() {
            return Err(AuthError::AuthFailed);
        }

        let user = db::users::find_by_id(&self.pool, credential.user_id)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::AuthFailed)?;

        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        db::users::revoke_refresh_credential(&self.pool, credential.id)
            .await
            .map_err(AuthError::Internal)?;

        self.issue(&user).await
    }

    /// Revoke every outstanding refresh credential for a user (the
    /// `logout` route). Idempotent.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<(), AuthError> {
        db::users::revoke_all_refresh_credentials(&self.pool, user_id)
            .await
            .map_err(AuthError::Internal)
    }

    /// Verify signature + expiry only, no database lookup (access
    /// tokens are self-contained).
    pub fn require_auth(&self, bearer: &str) -> Result<Claims, AuthError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let data = jsonwebtoken::decode::<Claims>(bearer, &key, &Validation::default())
            .map_err(|_| AuthError::Unauthorized)?;
        Ok(data.claims)
    }

    async fn issue(&self, user: &User) -> Result<AuthSuccess, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.token_expiry).timestamp(),
        };

        let access_token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(e.into()))?;

        let refresh_token = generate_refresh_token();
        let refresh_id = Uuid::new_v4();
        let refresh_expires_at = now + self.refresh_expiry;

        db::users::insert_refresh_credential(&self.pool, refresh_id, user.id, &refresh_token, refresh_expires_at)
            .await
            .map_err(AuthError::Internal)?;

        Ok(AuthSuccess {
            access_token,
            refresh_token,
            expires_in: self.token_expiry.num_seconds() as u64,
            user: UserProjection::from(user),
        })
    }
}

/// Require the caller's role be one of `allowed`.
pub fn require_role(claims: &Claims, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// 32 bytes of CSPRNG output, hex-encoded. Generated once per mint, not
/// derived from any request input — the credential's only secrecy
/// comes from this randomness (it is looked up by exact match, not
/// guessed).
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn looks_like_token(s: &str) -> bool {
    !s.is_empty() && s.len() <= 256
}

/// Fixed-cost bcrypt hash of a constant password, computed once and
/// reused for every "user not found" authentication attempt, so the
/// bcrypt verify cost is paid identically whether the username exists.
fn dummy_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        bcrypt::hash("flintroute-dummy-password-for-timing-parity", bcrypt::DEFAULT_COST)
            .expect("bcrypt hash of a constant string must not fail")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_role_allows_listed_role() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Operator,
            iat: 0,
            exp: 0,
        };
        assert!(require_role(&claims, &[Role::Admin, Role::Operator]).is_ok());
    }

    #[test]
    fn require_role_rejects_unlisted_role() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::User,
            iat: 0,
            exp: 0,
        };
        assert!(matches!(
            require_role(&claims, &[Role::Admin]),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn dummy_hash_is_stable_across_calls() {
        assert_eq!(dummy_hash(), dummy_hash());
    }

    /// Proxy for the wall-clock timing-equivalence property: the
    /// absent-user path (`dummy_hash`) and a real user's hash are both
    /// bcrypt at `DEFAULT_COST`, so `authenticate` pays the same verify
    /// cost whichever branch it takes. Wall-clock assertions are flaky
    /// in CI, so this checks the cost factor encoded in the hash itself
    /// rather than measuring elapsed time.
    #[test]
    fn dummy_hash_and_a_real_hash_share_the_same_bcrypt_cost() {
        let real = bcrypt::hash("whatever-a-real-user-picked", bcrypt::DEFAULT_COST).unwrap();
        let cost_of = |h: &str| h.split('$').nth(2).unwrap().to_string();
        assert_eq!(cost_of(dummy_hash()), cost_of(&real));
    }

    #[test]
    fn refresh_tokens_are_unique() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
