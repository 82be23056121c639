// ABOUTME: Per-dialect database backends: connect, ping, bind, materialize
// ABOUTME: Handles are opened per request and closed on every exit path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::time::Duration;

use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::ExecutionResult;
use crate::sql::Driver;

mod mysql;
mod postgres;
mod sqlite;

/// Opens a handle for `driver`, pings it, runs the rewritten SQL with the
/// bound positional arguments, and materializes the full result set.
///
/// Every database call is bounded by `timeout`. The handle is closed before
/// returning on both success and failure.
///
/// # Errors
///
/// - [`AppError::ConnectFailed`] if the connection string is rejected or the
///   connect times out
/// - [`AppError::PingFailed`] if the liveness check fails
/// - [`AppError::ExecutionFailed`] if the query itself fails or times out
pub async fn run_query(
    driver: Driver,
    connection_string: &str,
    sql: &str,
    args: &[Value],
    timeout: Duration,
) -> AppResult<ExecutionResult> {
    match driver {
        Driver::Sqlite => sqlite::run(connection_string, sql, args, timeout).await,
        Driver::Postgres => postgres::run(connection_string, sql, args, timeout).await,
        Driver::Mysql => mysql::run(connection_string, sql, args, timeout).await,
        // Translation understands these dialects; executing against them
        // needs a driver backend that is not compiled into this build.
        Driver::Mssql | Driver::Odbc => Err(AppError::ConnectFailed {
            driver: driver.as_str().to_owned(),
            message: "no driver backend compiled in".to_owned(),
        }),
    }
}
