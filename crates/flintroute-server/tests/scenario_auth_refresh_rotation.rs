//! Scenario: refresh-token rotation and logout revocation.
//!
//! Drives the real `/auth/*` routes end-to-end against a migrated
//! Postgres test database rather than calling `AuthService` directly,
//! so the scenario matches exactly what an operator's client observes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use flintroute_server::{routes, state};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn make_state() -> Option<Arc<state::AppState>> {
    let pool = flintroute_testkit::test_pool().await.ok()?;
    let mut cfg = flintroute_config::Config::default();
    cfg.auth.jwt_secret = flintroute_testkit::TEST_JWT_SECRET.to_string();

    let sbc = flintroute_testkit::mock_sbc();
    let st = state::AppState::new(&cfg, pool, sbc).await.expect("build AppState");
    Some(st)
}

async fn post(router: axum::Router, uri: &str, body: Value, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(a) = auth {
        builder = builder.header("authorization", a);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("collect body").to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn refresh_rotates_and_revokes_the_prior_credential() {
    let Some(st) = make_state().await else { return };

    flintroute_testkit::insert_user(&st.pool, "operator-1", "hunter2", flintroute_schemas::Role::Operator)
        .await
        .expect("insert fixture user");

    let router = routes::build_router(st.clone());
    let (status, login_body) = post(
        router.clone(),
        "/api/v1/auth/login",
        json!({"username": "operator-1", "password": "hunter2"}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let r0 = login_body["refresh_token"].as_str().unwrap().to_string();

    let (status, refresh_body) = post(
        routes::build_router(st.clone()),
        "/api/v1/auth/refresh",
        json!({"refresh_token": r0}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let r1 = refresh_body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(r0, r1, "rotation must mint a new refresh credential");

    // r0 is now revoked: reusing it must fail.
    let (status, _) = post(
        routes::build_router(st.clone()),
        "/api/v1/auth/refresh",
        json!({"refresh_token": r0}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // r1 is still live.
    let (status, refresh_body2) = post(
        routes::build_router(st.clone()),
        "/api/v1/auth/refresh",
        json!({"refresh_token": r1}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let r2 = refresh_body2["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(r1, r2);
}

#[tokio::test]
async fn logout_revokes_every_outstanding_refresh_credential() {
    let Some(st) = make_state().await else { return };

    flintroute_testkit::insert_user(&st.pool, "operator-2", "hunter2", flintroute_schemas::Role::Operator)
        .await
        .expect("insert fixture user");

    let (status, login_body) = post(
        routes::build_router(st.clone()),
        "/api/v1/auth/login",
        json!({"username": "operator-2", "password": "hunter2"}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = login_body["access_token"].as_str().unwrap().to_string();
    let refresh_token = login_body["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = post(
        routes::build_router(st.clone()),
        "/api/v1/auth/logout",
        json!({}),
        Some(&format!("Bearer {access}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        routes::build_router(st),
        "/api/v1/auth/refresh",
        json!({"refresh_token": refresh_token}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_username_and_wrong_password_yield_the_same_error() {
    let Some(st) = make_state().await else { return };

    flintroute_testkit::insert_user(&st.pool, "operator-3", "correct-horse", flintroute_schemas::Role::User)
        .await
        .expect("insert fixture user");

    let (status_unknown, body_unknown) = post(
        routes::build_router(st.clone()),
        "/api/v1/auth/login",
        json!({"username": "no-such-user", "password": "whatever"}),
        None,
    )
    .await;

    let (status_wrong, body_wrong) = post(
        routes::build_router(st),
        "/api/v1/auth/login",
        json!({"username": "operator-3", "password": "not-the-password"}),
        None,
    )
    .await;

    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_unknown["error"], body_wrong["error"],
        "absent-user and wrong-password must be indistinguishable to the client"
    );
}
