// ABOUTME: Append-only audit repository with joined display fields on reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use sqlx::Row;

use super::{AuditRepository, Catalog};
use crate::errors::{AppError, AppResult};
use crate::models::AuditLog;

#[async_trait]
impl AuditRepository for Catalog {
    async fn append(&self, entry: &AuditLog) -> AppResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO audit_logs
                (timestamp, user_id, api_key_id, connection_id, query_id,
                 duration_ms, status, error_message, params)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(entry.timestamp.with_timezone(&Utc))
        .bind(entry.user_id)
        .bind(entry.api_key_id)
        .bind(entry.connection_id)
        .bind(entry.query_id)
        .bind(entry.duration_ms)
        .bind(&entry.status)
        .bind(&entry.error_message)
        .bind(&entry.params)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to append audit row: {e}")))?;
        Ok(result.last_insert_rowid())
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<AuditLog>> {
        let rows = sqlx::query(
            r"
            SELECT
                a.id, a.timestamp, a.user_id, a.api_key_id, a.connection_id,
                a.query_id, a.duration_ms, a.status, a.error_message, a.params,
                k.key_prefix, k.description,
                c.name AS connection_name,
                q.slug AS query_slug
            FROM audit_logs a
            LEFT JOIN api_keys k ON a.api_key_id = k.id
            LEFT JOIN connections c ON a.connection_id = c.id
            LEFT JOIN queries q ON a.query_id = q.id
            ORDER BY a.timestamp DESC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to read audit rows: {e}")))?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp: DateTime<Utc> = row
                .try_get("timestamp")
                .map_err(|e| AppError::database(e.to_string()))?;
            let key_prefix: Option<String> = row
                .try_get("key_prefix")
                .map_err(|e| AppError::database(e.to_string()))?;
            let key_description: Option<String> = row
                .try_get("description")
                .map_err(|e| AppError::database(e.to_string()))?;
            let connection_name: Option<String> = row
                .try_get("connection_name")
                .map_err(|e| AppError::database(e.to_string()))?;
            let query_slug: Option<String> = row
                .try_get("query_slug")
                .map_err(|e| AppError::database(e.to_string()))?;
            let error_message: Option<String> = row
                .try_get("error_message")
                .map_err(|e| AppError::database(e.to_string()))?;
            let params: Option<String> = row
                .try_get("params")
                .map_err(|e| AppError::database(e.to_string()))?;

            let api_key_prefix = match (key_prefix, key_description) {
                (Some(prefix), Some(desc)) if !desc.is_empty() => format!("{prefix}... ({desc})"),
                (Some(prefix), _) => format!("{prefix}..."),
                (None, _) => String::new(),
            };

            logs.push(AuditLog {
                id: row
                    .try_get("id")
                    .map_err(|e| AppError::database(e.to_string()))?,
                timestamp: timestamp.with_timezone(&Local),
                user_id: row
                    .try_get::<Option<i64>, _>("user_id")
                    .map_err(|e| AppError::database(e.to_string()))?
                    .unwrap_or(0),
                api_key_id: row
                    .try_get("api_key_id")
                    .map_err(|e| AppError::database(e.to_string()))?,
                connection_id: row
                    .try_get::<Option<i64>, _>("connection_id")
                    .map_err(|e| AppError::database(e.to_string()))?
                    .unwrap_or(0),
                query_id: row
                    .try_get::<Option<i64>, _>("query_id")
                    .map_err(|e| AppError::database(e.to_string()))?
                    .unwrap_or(0),
                duration_ms: row
                    .try_get::<Option<i64>, _>("duration_ms")
                    .map_err(|e| AppError::database(e.to_string()))?
                    .unwrap_or(0),
                status: row
                    .try_get::<Option<String>, _>("status")
                    .map_err(|e| AppError::database(e.to_string()))?
                    .unwrap_or_default(),
                error_message: error_message.unwrap_or_default(),
                params: params.unwrap_or_default(),
                api_key_prefix,
                connection_name: connection_name.unwrap_or_default(),
                query_slug: query_slug.unwrap_or_default(),
            });
        }
        Ok(logs)
    }

    async fn prune(&self, keep: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM audit_logs
            WHERE id NOT IN (SELECT id FROM audit_logs ORDER BY id DESC LIMIT ?)
            ",
        )
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to prune audit rows: {e}")))?;
        Ok(result.rows_affected())
    }
}
