// ABOUTME: Query execution pipeline: lookup, decrypt, rewrite, bind, run, audit
// ABOUTME: Exactly one audit row per attempt, on every exit path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use serde_json::{Map, Value};
use tokio::sync::Notify;
use tracing::warn;

use crate::catalog::{AuditRepository, ConnectionRepository, QueryRepository};
use crate::crypto::SecretCipher;
use crate::drivers;
use crate::errors::{AppError, AppResult};
use crate::models::{AuditLog, AuditStatus, DbConnection, ExecutionResult};
use crate::sql::{pagination, parser, Driver};
use crate::utils::slugify;

/// Deadline applied to every database call within one request
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request execution context
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Authenticated API key, recorded on the audit row
    pub api_key_id: Option<i64>,
    /// Acting user; 0 when the request is keyed only
    pub user_id: i64,
    /// Database call deadline
    pub timeout: Duration,
    /// Notified when the inbound request is abandoned; aborts the in-flight
    /// database call and surfaces `Cancelled`
    pub cancel: Option<Arc<Notify>>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            api_key_id: None,
            user_id: 0,
            timeout: QUERY_TIMEOUT,
            cancel: None,
        }
    }
}

impl RequestContext {
    /// Context for a request authenticated by the given API key.
    #[must_use]
    pub fn for_api_key(api_key_id: i64) -> Self {
        Self {
            api_key_id: Some(api_key_id),
            ..Self::default()
        }
    }
}

/// Orchestrates the execution pipeline over the catalog repositories, the
/// secret cipher, and the dialect backends.
#[derive(Clone)]
pub struct QueryExecutor {
    connections: Arc<dyn ConnectionRepository>,
    queries: Arc<dyn QueryRepository>,
    audit: Arc<dyn AuditRepository>,
    cipher: Arc<SecretCipher>,
}

impl QueryExecutor {
    #[must_use]
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        queries: Arc<dyn QueryRepository>,
        audit: Arc<dyn AuditRepository>,
        cipher: Arc<SecretCipher>,
    ) -> Self {
        Self {
            connections,
            queries,
            audit,
            cipher,
        }
    }

    /// Runs a saved query by slug against a connection id.
    ///
    /// # Errors
    ///
    /// Fails with `QueryNotFound` for an unknown slug or a connection outside
    /// the query's allow-list, `QueryInactive` for a disabled query, and
    /// every [`Self::execute_sql`] error beyond that.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        connection_id: i64,
        query_slug: &str,
        params: &mut Map<String, Value>,
    ) -> AppResult<ExecutionResult> {
        let query = self
            .queries
            .by_slug(query_slug)
            .await?
            .ok_or_else(|| AppError::QueryNotFound(query_slug.to_owned()))?;
        if !query.is_active {
            return Err(AppError::QueryInactive);
        }
        // Report the allow-list miss exactly like an unknown slug so callers
        // cannot probe which queries exist on other connections.
        if !query.allows_connection(connection_id) {
            return Err(AppError::QueryNotFound(query_slug.to_owned()));
        }
        self.execute_sql(ctx, connection_id, &query.sql_text, params, query.id)
            .await
    }

    /// Runs a saved query, resolving the connection by name or slug.
    ///
    /// # Errors
    ///
    /// Fails with `ConnectionNotFound` when neither the exact name nor any
    /// slugified name matches, plus every [`Self::execute`] error.
    pub async fn execute_by_name(
        &self,
        ctx: &RequestContext,
        connection_name: &str,
        query_slug: &str,
        params: &mut Map<String, Value>,
    ) -> AppResult<ExecutionResult> {
        let conn = self.resolve_connection(connection_name).await?;
        self.execute(ctx, conn.id, query_slug, params).await
    }

    /// Runs raw SQL text against a connection. `query_id` is 0 for ad-hoc
    /// statements with no catalog entry.
    ///
    /// Exactly one audit row is appended per call, whatever the outcome,
    /// including cancellation of the request future. Audit emission is
    /// best-effort and never alters the returned result.
    ///
    /// # Errors
    ///
    /// One error kind per pipeline stage: `ConnectionNotFound`,
    /// `ConnectionInactive`, `DecryptionFailure`, `MissingParameters`,
    /// `ConnectFailed`, `PingFailed`, `ExecutionFailed`, plus `Cancelled`
    /// when the context's cancel signal fires mid-query. Nothing is retried.
    pub async fn execute_sql(
        &self,
        ctx: &RequestContext,
        connection_id: i64,
        sql_text: &str,
        params: &mut Map<String, Value>,
        query_id: i64,
    ) -> AppResult<ExecutionResult> {
        let scope = AuditScope::begin(
            Arc::clone(&self.audit),
            ctx,
            connection_id,
            query_id,
            params,
        );

        let result = self.run(ctx, connection_id, sql_text, params).await;
        match &result {
            Ok(_) => scope.finish(AuditStatus::Success, None).await,
            Err(e) => scope.finish(AuditStatus::Error, Some(&e.to_string())).await,
        }
        result
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        connection_id: i64,
        sql_text: &str,
        params: &mut Map<String, Value>,
    ) -> AppResult<ExecutionResult> {
        let conn = self
            .connections
            .by_id(connection_id)
            .await?
            .ok_or_else(|| AppError::ConnectionNotFound(connection_id.to_string()))?;
        if !conn.is_active {
            return Err(AppError::ConnectionInactive);
        }

        let driver = Driver::from_str(&conn.driver).map_err(|e| AppError::ConnectFailed {
            driver: conn.driver.clone(),
            message: e.to_string(),
        })?;

        let connection_string = self
            .cipher
            .decrypt(&conn.connection_string_enc)
            .map_err(|_| AppError::DecryptionFailure)?;

        let rewritten = pagination::rewrite(sql_text, driver, params);
        let parsed = parser::parse(&rewritten, Some(&mut *params), driver.placeholder_style());
        let args = parser::bind(&parsed.param_names, params, &parsed.defaults)?;

        let query = drivers::run_query(driver, &connection_string, &parsed.sql, &args, ctx.timeout);
        match &ctx.cancel {
            Some(cancel) => {
                // Dropping the query future aborts the in-flight database
                // call; the error then flows through the normal audit path
                tokio::select! {
                    biased;
                    () = cancel.notified() => {
                        Err(AppError::Cancelled("request cancelled by client".to_owned()))
                    }
                    result = query => result,
                }
            }
            None => query.await,
        }
    }

    /// Exact name match first, then the slugified form the OpenAPI document
    /// advertises.
    async fn resolve_connection(&self, name: &str) -> AppResult<DbConnection> {
        if let Some(conn) = self.connections.by_name(name).await? {
            return Ok(conn);
        }
        let all = self.connections.list().await?;
        all.into_iter()
            .find(|c| slugify(&c.name) == name)
            .ok_or_else(|| AppError::ConnectionNotFound(name.to_owned()))
    }
}

/// Scoped audit action armed at pipeline entry.
///
/// `finish` records the real outcome; if the request future is dropped before
/// that (client disconnect), `Drop` emits the row with an `ERROR` status and
/// a cancellation message from a spawned task.
struct AuditScope {
    audit: Arc<dyn AuditRepository>,
    pending: Option<AuditLog>,
    started: Instant,
}

impl AuditScope {
    fn begin(
        audit: Arc<dyn AuditRepository>,
        ctx: &RequestContext,
        connection_id: i64,
        query_id: i64,
        params: &Map<String, Value>,
    ) -> Self {
        let params_json = if params.is_empty() {
            String::new()
        } else {
            serde_json::to_string(params).unwrap_or_default()
        };
        Self {
            audit,
            started: Instant::now(),
            pending: Some(AuditLog {
                id: 0,
                timestamp: Local::now(),
                user_id: ctx.user_id,
                api_key_id: ctx.api_key_id,
                connection_id,
                query_id,
                duration_ms: 0,
                status: String::new(),
                error_message: String::new(),
                params: params_json,
                api_key_prefix: String::new(),
                connection_name: String::new(),
                query_slug: String::new(),
            }),
        }
    }

    async fn finish(mut self, status: AuditStatus, error_message: Option<&str>) {
        if let Some(mut entry) = self.pending.take() {
            entry.duration_ms = duration_ms(self.started);
            entry.status = status.as_str().to_owned();
            entry.error_message = error_message.unwrap_or_default().to_owned();
            if let Err(e) = self.audit.append(&entry).await {
                warn!(error = %e, "failed to append audit row");
            }
        }
    }
}

impl Drop for AuditScope {
    fn drop(&mut self) {
        let Some(mut entry) = self.pending.take() else {
            return;
        };
        entry.duration_ms = duration_ms(self.started);
        entry.status = AuditStatus::Error.as_str().to_owned();
        entry.error_message = "request cancelled".to_owned();

        let audit = Arc::clone(&self.audit);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = audit.append(&entry).await {
                    warn!(error = %e, "failed to append audit row for cancelled request");
                }
            });
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}
