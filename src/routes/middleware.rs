// ABOUTME: API-key authentication and rate-limit middleware for /api routes
// ABOUTME: Client identity falls back from X-API-Key to forwarded/remote IP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::errors::AppError;
use crate::routes::AppState;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated key id, inserted into request extensions for the handler
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyId(pub i64);

/// Rejects requests without a valid `X-API-Key`, storing the key id in the
/// request extensions on success.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(presented) = header_value(&request, API_KEY_HEADER) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing X-API-Key header" })),
        )
            .into_response();
    };

    match state.auth.verify_api_key(&presented).await {
        Ok(api_key) => {
            request.extensions_mut().insert(ApiKeyId(api_key.id));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rate limits by API key header when present, else by client IP.
pub async fn rate_limit_by_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = header_value(&request, API_KEY_HEADER).unwrap_or_else(|| client_ip(&request));
    if !state.limiter.allow(&key) {
        info!(path = %request.uri().path(), "rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Rate limits by client IP. Used on public endpoints that carry no key.
pub async fn rate_limit_by_ip(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(&request);
    if !state.limiter.allow(&key) {
        info!(path = %request.uri().path(), client = %key, "rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Client IP in precedence order: `X-Forwarded-For`, `X-Real-IP`, then the
/// transport remote address.
fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = header_value(request, "x-forwarded-for") {
        return forwarded;
    }
    if let Some(real_ip) = header_value(request, "x-real-ip") {
        return real_ip;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |info| info.0.ip().to_string())
}
