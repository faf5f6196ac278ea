//! Maps each crate's domain error enum onto HTTP status codes via a
//! single `IntoResponse` impl, so every handler can propagate with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use flintroute_auth::AuthError;
use flintroute_peer::PeerError;
use flintroute_sbc::SbcError;
use flintroute_snapshot::SnapshotError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn respond(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

pub struct ApiError(pub StatusCode, pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        respond(self.0, self.1)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthFailed | AuthError::AccountDisabled => {
                ApiError(StatusCode::UNAUTHORIZED, "invalid credentials".to_string())
            }
            AuthError::Unauthorized => ApiError(StatusCode::UNAUTHORIZED, err.to_string()),
            AuthError::Forbidden => ApiError(StatusCode::FORBIDDEN, err.to_string()),
            AuthError::Internal(_) => {
                tracing::error!(error = %err, "internal auth error");
                ApiError(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        }
    }
}

impl From<PeerError> for ApiError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Validation(msg) => ApiError(StatusCode::BAD_REQUEST, msg),
            PeerError::Conflict => ApiError(StatusCode::CONFLICT, err.to_string()),
            PeerError::NotFound => ApiError(StatusCode::NOT_FOUND, err.to_string()),
            PeerError::Downstream(msg) => {
                tracing::warn!(error = %msg, "downstream southbound failure on peer mutation");
                ApiError(StatusCode::BAD_GATEWAY, msg)
            }
            PeerError::Internal(e) => {
                tracing::error!(error = %e, "internal peer coordinator error");
                ApiError(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        }
    }
}

impl From<SnapshotError> for ApiError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::NotFound => ApiError(StatusCode::NOT_FOUND, err.to_string()),
            SnapshotError::Downstream(msg) => {
                tracing::warn!(error = %msg, "downstream southbound failure on snapshot operation");
                ApiError(StatusCode::BAD_GATEWAY, msg)
            }
            SnapshotError::Internal(e) => {
                tracing::error!(error = %e, "internal snapshot store error");
                ApiError(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        }
    }
}

impl From<SbcError> for ApiError {
    fn from(err: SbcError) -> Self {
        match err {
            SbcError::Transient(_) => ApiError(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            SbcError::Permanent(_) | SbcError::PeerUnknown(_) => {
                ApiError(StatusCode::BAD_GATEWAY, err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "unhandled internal error");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    }
}
