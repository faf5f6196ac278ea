//! Scenario: repeat `POST /api/v1/config/backup` against an unchanged
//! running config returns the same version instead of duplicating it,
//! via content-addressed capture.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use flintroute_schemas::Role;
use flintroute_server::{routes, state};
use tower::ServiceExt;

async fn make_state() -> Option<Arc<state::AppState>> {
    let pool = flintroute_testkit::test_pool().await.ok()?;
    let mut cfg = flintroute_config::Config::default();
    cfg.auth.jwt_secret = flintroute_testkit::TEST_JWT_SECRET.to_string();

    let sbc = flintroute_testkit::mock_sbc();
    sbc.set_running_config("router bgp 65000\n neighbor 192.0.2.1 remote-as 65001\n");

    let st = state::AppState::new(&cfg, pool, sbc).await.expect("build AppState");
    Some(st)
}

async fn post_backup(router: axum::Router, auth: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/config/backup")
        .header("authorization", auth)
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("collect body").to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn repeat_capture_of_unchanged_config_returns_same_version() {
    let Some(st) = make_state().await else { return };
    let auth = format!(
        "Bearer {}",
        flintroute_testkit::mint_test_token(uuid::Uuid::new_v4(), Role::Admin)
    );

    let (status1, body1) = post_backup(routes::build_router(st.clone()), &auth).await;
    assert_eq!(status1, StatusCode::CREATED);

    let (status2, body2) = post_backup(routes::build_router(st), &auth).await;
    assert_eq!(status2, StatusCode::CREATED);

    assert_eq!(
        body1["id"], body2["id"],
        "capturing an unchanged running config twice must not create a second version"
    );
    assert_eq!(body1["hash"], body2["hash"]);
}
