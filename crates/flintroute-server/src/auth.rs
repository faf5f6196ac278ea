//! Bearer-token extraction and role gating shared by every handler.

use axum::http::{HeaderMap, StatusCode};

use flintroute_auth::{AuthService, Claims};
use flintroute_schemas::Role;

use crate::error::ApiError;

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;

    raw.strip_prefix("Bearer ")
        .ok_or_else(|| ApiError(StatusCode::UNAUTHORIZED, "malformed authorization header".to_string()))
}

/// Same as [`authorize`], but also accepts the token as a `?token=`
/// query parameter — the WebSocket upgrade request is the one surface
/// where a browser client cannot always set a custom `Authorization`
/// header.
pub fn authorize_ws(
    auth: &AuthService,
    headers: &HeaderMap,
    query_token: Option<&str>,
    allowed: &[Role],
) -> Result<Claims, ApiError> {
    let token = match bearer_token(headers) {
        Ok(t) => t.to_string(),
        Err(_) => query_token
            .map(|t| t.to_string())
            .ok_or_else(|| ApiError(StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?,
    };
    let claims = auth.require_auth(&token)?;
    flintroute_auth::require_role(&claims, allowed)?;
    Ok(claims)
}

/// Verify the bearer token and require the caller's role be one of
/// `allowed`. Every route uses this; read-only routes pass every role,
/// mutating routes restrict to `Operator`/`Admin` (see DESIGN.md for
/// the per-route role assignment rationale).
pub fn authorize(auth: &AuthService, headers: &HeaderMap, allowed: &[Role]) -> Result<Claims, ApiError> {
    let token = bearer_token(headers)?;
    let claims = auth.require_auth(token)?;
    flintroute_auth::require_role(&claims, allowed)?;
    Ok(claims)
}

pub const ANY_ROLE: &[Role] = &[Role::Admin, Role::Operator, Role::User];
pub const OPERATOR_UP: &[Role] = &[Role::Admin, Role::Operator];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
