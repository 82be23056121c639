// ABOUTME: The public execution endpoint: bind URL and body, run, serialize
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Map, Value};

use crate::executor::RequestContext;
use crate::routes::middleware::ApiKeyId;
use crate::routes::AppState;

/// `POST /api/:connection_name/:query_slug`
///
/// The body is a JSON object of parameter values; a missing, empty, or
/// non-object body is treated as `{}`. Success returns
/// `{"success": true, "data": rows}`; failures map to the error's status with
/// an `{"error": message}` body.
pub async fn execute_query(
    State(state): State<AppState>,
    Path((connection_name, query_slug)): Path<(String, String)>,
    api_key: Option<Extension<ApiKeyId>>,
    body: Bytes,
) -> Response {
    let mut params = parse_params(&body);

    let ctx = api_key.map_or_else(RequestContext::default, |Extension(ApiKeyId(id))| {
        RequestContext::for_api_key(id)
    });

    match state
        .executor
        .execute_by_name(&ctx, &connection_name, &query_slug, &mut params)
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": result.rows })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

fn parse_params(body: &[u8]) -> Map<String, Value> {
    if body.is_empty() {
        return Map::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
