// ABOUTME: Router-level tests: auth gate, rate limiting, envelopes, OpenAPI
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn execute_request(path: &str, api_key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_owned())).expect("request")
}

#[tokio::test]
async fn missing_api_key_is_unauthorized_with_no_audit_row() {
    let harness = common::create_harness().await;
    let conn_id = harness
        .seed_connection("mem", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query("ping", "SELECT 1 AS n", &[conn_id], true)
        .await;
    let router = harness.router(60.0, 10);

    let response = router
        .oneshot(execute_request("/api/mem/ping", None, "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body.get("error").is_some());

    assert!(harness.audit.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_api_key_is_unauthorized() {
    let harness = common::create_harness().await;
    let router = harness.router(60.0, 10);

    let response = router
        .oneshot(execute_request("/api/mem/ping", Some("bogus"), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid api key");
}

#[tokio::test]
async fn keyed_request_executes_and_returns_rows() {
    let harness = common::create_harness().await;
    let key = harness.seed_api_key().await;
    let conn_id = harness
        .seed_connection("mem", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query("ping", "SELECT 1 AS n", &[conn_id], true)
        .await;
    let router = harness.router(60.0, 10);

    let response = router
        .oneshot(execute_request("/api/mem/ping", Some(&key), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["data"][0]["n"], Value::from(1));
}

#[tokio::test]
async fn missing_body_is_treated_as_empty_object() {
    let harness = common::create_harness().await;
    let key = harness.seed_api_key().await;
    let conn_id = harness
        .seed_connection("mem", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query("dflt", "SELECT {s:fallback} AS s", &[conn_id], true)
        .await;
    let router = harness.router(60.0, 10);

    let response = router
        .oneshot(execute_request("/api/mem/dflt", Some(&key), ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["s"], Value::from("fallback"));
}

#[tokio::test]
async fn executor_errors_map_to_json_error_bodies() {
    let harness = common::create_harness().await;
    let key = harness.seed_api_key().await;
    let conn_id = harness
        .seed_connection("mem", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query("needs-arg", "SELECT {a} AS a", &[conn_id], true)
        .await;
    let router = harness.router(60.0, 10);

    // Missing parameter → 400
    let response = router
        .clone()
        .oneshot(execute_request("/api/mem/needs-arg", Some(&key), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "missing parameters: a");

    // Unknown query → 404
    let response = router
        .clone()
        .oneshot(execute_request("/api/mem/nope", Some(&key), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unknown connection → 404
    let response = router
        .oneshot(execute_request("/api/ghost/needs-arg", Some(&key), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn burst_exhaustion_returns_429_and_audits_only_admitted_calls() {
    let harness = common::create_harness().await;
    let key = harness.seed_api_key().await;
    let conn_id = harness
        .seed_connection("mem", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query("ping", "SELECT 1 AS n", &[conn_id], true)
        .await;
    let router = harness.router(60.0, 10);

    let mut ok = 0;
    let mut limited = 0;
    for _ in 0..11 {
        let response = router
            .clone()
            .oneshot(execute_request("/api/mem/ping", Some(&key), "{}"))
            .await
            .unwrap();
        match response.status() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(limited, 1);

    let audit = harness.audit.recent(100).await.unwrap();
    assert_eq!(audit.len(), 10);
}

#[tokio::test]
async fn docs_endpoints_are_public() {
    let harness = common::create_harness().await;
    let conn_id = harness
        .seed_connection("My Production DB", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query(
            "list-items",
            "SELECT id FROM t WHERE status = {status} ORDER BY id {pagination}",
            &[conn_id],
            true,
        )
        .await;
    let router = harness.router(60.0, 10);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/docs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;

    assert_eq!(doc["openapi"], "3.0.0");
    let operation = &doc["paths"]["/api/my-production-db/list-items"]["post"];
    assert_eq!(operation["tags"][0], "My Production DB");

    let properties = &operation["requestBody"]["content"]["application/json"]["schema"]["properties"];
    assert!(properties.get("status").is_some());
    // The pagination token is advertised through _page/_limit, not itself
    assert!(properties.get("pagination").is_none());
    assert_eq!(properties["_page"]["default"], Value::from(1));
    assert_eq!(properties["_limit"]["default"], Value::from(50));

    assert_eq!(
        doc["components"]["securitySchemes"]["ApiKeyAuth"]["name"],
        "X-API-Key"
    );
}

#[tokio::test]
async fn query_not_allowed_on_connection_is_not_found() {
    let harness = common::create_harness().await;
    let key = harness.seed_api_key().await;
    let allowed = harness
        .seed_connection("allowed", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_connection("other", "sqlite", ":memory:", true)
        .await;
    harness
        .seed_query("narrow", "SELECT 1 AS n", &[allowed], true)
        .await;
    let router = harness.router(60.0, 10);

    let response = router
        .oneshot(execute_request("/api/other/narrow", Some(&key), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
