// ABOUTME: HTTP route assembly: docs are public, execution is keyed and limited
// ABOUTME: Shared state carries the executor, auth service, catalog, and limiter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::catalog::{ConnectionRepository, QueryRepository};
use crate::executor::QueryExecutor;
use crate::rate_limit::RateLimiter;

pub mod api;
pub mod docs;
pub mod middleware;

/// Shared state handed to every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub executor: QueryExecutor,
    pub auth: AuthService,
    pub connections: Arc<dyn ConnectionRepository>,
    pub queries: Arc<dyn QueryRepository>,
    pub limiter: RateLimiter,
    /// Listen port, echoed into the OpenAPI servers block
    pub port: u16,
}

/// Public API routes
pub struct ApiRoutes;

impl ApiRoutes {
    /// Builds the `/api` router.
    ///
    /// The two doc paths are unauthenticated; the execution route passes the
    /// API-key check and then the by-key rate limiter.
    pub fn router(state: AppState) -> Router {
        let doc_routes = Router::new()
            .route("/api/docs", get(docs::serve_swagger_ui))
            .route("/api/docs/openapi.json", get(docs::openapi_document))
            .with_state(state.clone());

        // Last layer added runs first: the API-key check gates the request,
        // then the by-key limiter is consulted
        let execute_routes = Router::new()
            .route(
                "/api/:connection_name/:query_slug",
                post(api::execute_query),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::rate_limit_by_api_key,
            ))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::require_api_key,
            ))
            .with_state(state);

        doc_routes
            .merge(execute_routes)
            .layer(TraceLayer::new_for_http())
    }
}
