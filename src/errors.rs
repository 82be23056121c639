// ABOUTME: Application error type covering every failure the execution core surfaces
// ABOUTME: Maps each error kind to an HTTP status and a JSON error body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Convenience alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Every error kind the execution core surfaces to its callers.
///
/// The variants mirror the pipeline stages: catalog lookup, secret
/// decryption, parameter binding, driver connect/ping, execution, and the
/// request gates (auth, rate limiting, cancellation).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("connection is inactive")]
    ConnectionInactive,

    #[error("query not found: {0}")]
    QueryNotFound(String),

    #[error("query is inactive")]
    QueryInactive,

    #[error("failed to decrypt connection string")]
    DecryptionFailure,

    #[error("missing parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("failed to open database connection ({driver}): {message}")]
    ConnectFailed { driver: String, message: String },

    #[error("failed to ping database: {0}")]
    PingFailed(String),

    #[error("execution error: {0}")]
    ExecutionFailed(String),

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("too many requests")]
    RateLimited,

    #[error("request cancelled: {0}")]
    Cancelled(String),

    #[error("catalog error: {0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Catalog storage failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Unclassified internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error kind.
    ///
    /// Driver execution failures are treated as caller errors: most reflect
    /// bad SQL or parameter types in the stored query.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConnectionNotFound(_) | Self::QueryNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionInactive
            | Self::QueryInactive
            | Self::MissingParameters(_)
            | Self::ExecutionFailed(_) => StatusCode::BAD_REQUEST,
            Self::DecryptionFailure | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ConnectFailed { .. } | Self::PingFailed(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            // Nginx convention for "client closed request"
            Self::Cancelled(_) => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
