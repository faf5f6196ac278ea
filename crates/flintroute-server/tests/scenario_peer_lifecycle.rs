//! In-process scenario tests for the BGP peer HTTP surface.
//!
//! Router is driven directly with `tower::ServiceExt::oneshot` — no TCP
//! socket, no FRR sidecar. The southbound client is the deterministic
//! in-memory mock so the call log is inspectable. Requires a reachable
//! Postgres test database named by `FLINTROUTE_TEST_DATABASE_URL`; tests
//! skip themselves (rather than fail) when that variable is unset.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use flintroute_schemas::Role;
use flintroute_server::{routes, state};
use serde_json::json;
use tower::ServiceExt;

async fn make_state() -> Option<Arc<state::AppState>> {
    let pool = flintroute_testkit::test_pool().await.ok()?;
    let mut cfg = flintroute_config::Config::default();
    cfg.auth.jwt_secret = flintroute_testkit::TEST_JWT_SECRET.to_string();

    let sbc = flintroute_testkit::mock_sbc();
    let st = state::AppState::new(&cfg, pool, sbc)
        .await
        .expect("build AppState");
    Some(st)
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("collect body").to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn bearer(role: Role) -> String {
    format!("Bearer {}", flintroute_testkit::mint_test_token(uuid::Uuid::new_v4(), role))
}

#[tokio::test]
async fn operator_can_create_get_update_delete_a_peer() {
    let Some(st) = make_state().await else { return };
    let router = routes::build_router(st);
    let auth = bearer(Role::Operator);

    let create_req = Request::builder()
        .method("POST")
        .uri("/api/v1/bgp/peers")
        .header("authorization", &auth)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "ip_address": "192.0.2.10",
                "local_asn": 65001,
                "remote_asn": 65002,
                "name": "edge-1"
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = call(router.clone(), create_req).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().expect("created peer has an id").to_string();
    assert_eq!(body["enabled"], true);

    let get_req = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/bgp/peers/{id}"))
        .header("authorization", &auth)
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(router.clone(), get_req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "edge-1");

    let update_req = Request::builder()
        .method("PUT")
        .uri(format!("/api/v1/bgp/peers/{id}"))
        .header("authorization", &auth)
        .header("content-type", "application/json")
        .body(Body::from(json!({ "description": "core uplink" }).to_string()))
        .unwrap();
    let (status, body) = call(router.clone(), update_req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "core uplink");
    assert_eq!(body["name"], "edge-1", "unset fields must be left unchanged");

    let delete_req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/bgp/peers/{id}"))
        .header("authorization", &auth)
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(router.clone(), delete_req).await;
    assert_eq!(status, StatusCode::OK);

    let get_again_req = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/bgp/peers/{id}"))
        .header("authorization", &auth)
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(router, get_again_req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plain_user_role_cannot_create_a_peer() {
    let Some(st) = make_state().await else { return };
    let router = routes::build_router(st);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/bgp/peers")
        .header("authorization", bearer(Role::User))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "ip_address": "192.0.2.20",
                "local_asn": 65001,
                "remote_asn": 65003,
                "name": "should-be-refused"
            })
            .to_string(),
        ))
        .unwrap();

    let (status, _) = call(router, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_ip_address_is_rejected_with_409() {
    let Some(st) = make_state().await else { return };
    let router = routes::build_router(st);
    let auth = bearer(Role::Admin);

    let body = json!({
        "ip_address": "198.51.100.1",
        "local_asn": 65001,
        "remote_asn": 65004,
        "name": "dup-1"
    })
    .to_string();

    let first = Request::builder()
        .method("POST")
        .uri("/api/v1/bgp/peers")
        .header("authorization", &auth)
        .header("content-type", "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _) = call(router.clone(), first).await;
    assert_eq!(status, StatusCode::CREATED);

    let second = Request::builder()
        .method("POST")
        .uri("/api/v1/bgp/peers")
        .header("authorization", &auth)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _) = call(router, second).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_bearer_token_is_unauthorized() {
    let Some(st) = make_state().await else { return };
    let router = routes::build_router(st);

    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/bgp/peers")
        .body(Body::empty())
        .unwrap();

    let (status, _) = call(router, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
