// ABOUTME: PostgreSQL backend: per-request connection, dynamic bind, row to JSON
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{Column, Connection, PgConnection, Row, TypeInfo, ValueRef};

use crate::errors::{AppError, AppResult};
use crate::models::ExecutionResult;

pub(super) async fn run(
    connection_string: &str,
    sql: &str,
    args: &[Value],
    timeout: Duration,
) -> AppResult<ExecutionResult> {
    let options = PgConnectOptions::from_str(connection_string)
        .map_err(|e| connect_failed(&e.to_string()))?;

    let mut conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
        .await
        .map_err(|_| connect_failed("connect timed out"))?
        .map_err(|e| connect_failed(&e.to_string()))?;

    let result = execute(&mut conn, sql, args, timeout).await;
    let _ = conn.close().await;
    result
}

fn connect_failed(message: &str) -> AppError {
    AppError::ConnectFailed {
        driver: "postgres".to_owned(),
        message: message.to_owned(),
    }
}

async fn execute(
    conn: &mut PgConnection,
    sql: &str,
    args: &[Value],
    timeout: Duration,
) -> AppResult<ExecutionResult> {
    tokio::time::timeout(timeout, conn.ping())
        .await
        .map_err(|_| AppError::PingFailed("ping timed out".to_owned()))?
        .map_err(|e| AppError::PingFailed(e.to_string()))?;

    let mut query = sqlx::query(sql);
    for value in args {
        query = bind_value(query, value);
    }

    let rows = tokio::time::timeout(timeout, query.fetch_all(conn))
        .await
        .map_err(|_| {
            AppError::ExecutionFailed(format!("query timed out after {}s", timeout.as_secs()))
        })?
        .map_err(|e| AppError::ExecutionFailed(e.to_string()))?;

    let columns: Vec<String> = rows.first().map_or_else(Vec::new, |row| {
        row.columns().iter().map(|c| c.name().to_owned()).collect()
    });

    let mut out_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut map = Map::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            map.insert(name.clone(), cell_to_json(row, idx));
        }
        out_rows.push(map);
    }

    Ok(ExecutionResult {
        columns,
        rows: out_rows,
    })
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

/// Decodes by the wire type name, with generic fallbacks for the rest.
fn cell_to_json(row: &PgRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) => {
            if raw.is_null() {
                return Value::Null;
            }
            raw.type_info().name().to_ascii_uppercase()
        }
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "BOOL" => {
            if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
                return Value::Bool(v);
            }
        }
        "INT2" => {
            if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
                return Value::from(i64::from(v));
            }
        }
        "INT4" => {
            if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
                return Value::from(i64::from(v));
            }
        }
        "INT8" => {
            if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
                return Value::from(v);
            }
        }
        "FLOAT4" => {
            if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
                return serde_json::Number::from_f64(f64::from(v))
                    .map_or(Value::Null, Value::Number);
            }
        }
        "FLOAT8" => {
            if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
                return serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number);
            }
        }
        // Opaque byte strings are surfaced as UTF-8 text
        "BYTEA" => {
            if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
                return Value::String(String::from_utf8_lossy(&v).into_owned());
            }
        }
        "DATE" => {
            if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
                return Value::String(v.format("%Y-%m-%d").to_string());
            }
        }
        "TIMESTAMP" => {
            if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
                return Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
        }
        "TIMESTAMPTZ" => {
            if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
                return Value::String(v.to_rfc3339());
            }
        }
        _ => {}
    }

    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::from(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
        return serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number);
    }
    if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(v);
    }
    Value::Null
}
