//! v1 and v2 share middlewares and handlers; only the payload shape and the
//! login decoder differ.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use foodcourt::identity::Role;

#[tokio::test]
async fn v2_wraps_payloads_in_an_envelope() {
    let h = harness();
    let resp = send(&h.app, get_request("/api/v2/vendors", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"data": {"vendors": []}, "error": null}));

    let resp = send(&h.app, get_request("/api/v1/vendors", None)).await;
    assert_eq!(body_json(resp).await, json!({"vendors": []}));
}

#[tokio::test]
async fn v1_login_rejects_extra_fields_v2_accepts_them() {
    let h = harness();
    let id = h.db.seed_user("alice", "pw", Role::Customer);
    let body = json!({"login": "alice", "password": "pw", "device": "ios"});

    let resp = send(&h.app, json_request("POST", "/api/v1/sessions", None, None, body.clone())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(cookie_value(&resp, "session_id").is_none());

    let resp = send(&h.app, json_request("POST", "/api/v2/sessions", None, None, body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(cookie_value(&resp, "session_id").is_some());
    assert_eq!(body_json(resp).await, json!({"data": {"status": "ok", "user_id": id}, "error": null}));
}

#[tokio::test]
async fn sessions_are_shared_across_versions() {
    let h = harness();
    h.db.seed_user("alice", "pw", Role::Customer);
    let session = login(&h.app, "/api/v1", "alice", "pw").await;
    let token = fetch_csrf(&h.app, "/api/v2", &session).await;
    let resp = send(
        &h.app,
        json_request("PUT", "/api/v2/profiles", Some(&cookies(&session, &token)), Some(&token), json!({"display_name": "Alice"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["display_name"], json!("Alice"));
}

#[tokio::test]
async fn trust_boundary_failures_have_no_body_in_either_version() {
    let h = harness();
    for prefix in ["/api/v1", "/api/v2"] {
        let resp = send(&h.app, get_request(&format!("{prefix}/carts"), None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_len(resp).await, 0);
    }
}

#[tokio::test]
async fn validation_errors_use_the_version_shape() {
    let h = harness();
    h.db.seed_user("alice", "pw", Role::Customer);
    let session = login(&h.app, "/api/v1", "alice", "pw").await;
    let token = fetch_csrf(&h.app, "/api/v1", &session).await;
    let bad_cart = json!({"items": [{"product_id": 1, "quantity": 0}]});

    let resp = send(&h.app, json_request("PUT", "/api/v1/carts", Some(&cookies(&session, &token)), Some(&token), bad_cart.clone())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v1 = body_json(resp).await;
    assert_eq!(v1["status"], json!("error"));
    assert_eq!(v1["code"], json!("invalid_quantity"));

    let resp = send(&h.app, json_request("PUT", "/api/v2/carts", Some(&cookies(&session, &token)), Some(&token), bad_cart)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v2 = body_json(resp).await;
    assert_eq!(v2["data"], json!(null));
    assert_eq!(v2["error"]["code"], json!("invalid_quantity"));
    assert_eq!(h.db.writes(), 0);
}

#[tokio::test]
async fn registration_then_login() {
    let h = harness();
    let resp = send(&h.app, json_request("POST", "/api/v1/users", None, None, json!({"login": "dana", "password": "pw", "role": "partner"}))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["user_id"].as_str().unwrap().to_string();

    let resp = send(&h.app, json_request("POST", "/api/v1/users", None, None, json!({"login": "dana", "password": "pw"}))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(&h.app, json_request("POST", "/api/v2/users", None, None, json!({"login": "eve", "password": "pw", "role": "admin"}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let session = login(&h.app, "/api/v2", "dana", "pw").await;
    let resp = send(&h.app, get_request("/api/v2/profiles", Some(&format!("session_id={session}")))).await;
    assert_eq!(body_json(resp).await["data"]["principal_id"], json!(id));
}

#[tokio::test]
async fn cors_preflight_allows_the_csrf_header_for_known_origins() {
    let h = harness();
    let req = axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/carts")
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "PUT")
        .header("Access-Control-Request-Headers", "x-csrf-token")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "http://localhost:3000");
    assert_eq!(headers.get("access-control-allow-credentials").unwrap(), "true");
    assert!(headers.get("access-control-allow-headers").unwrap().to_str().unwrap().contains("x-csrf-token"));
}
