// ABOUTME: API key repository; hash lookups never match revoked keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{ApiKeyRepository, Catalog};
use crate::errors::{AppError, AppResult};
use crate::models::ApiKey;

fn row_to_api_key(row: &SqliteRow) -> AppResult<ApiKey> {
    let is_active: i64 = row
        .try_get("is_active")
        .map_err(|e| AppError::database(e.to_string()))?;
    let description: Option<String> = row
        .try_get("description")
        .map_err(|e| AppError::database(e.to_string()))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| AppError::database(e.to_string()))?;
    let last_used_at: Option<DateTime<Utc>> = row
        .try_get("last_used_at")
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(ApiKey {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| AppError::database(e.to_string()))?,
        key_prefix: row
            .try_get("key_prefix")
            .map_err(|e| AppError::database(e.to_string()))?,
        key_hash: row
            .try_get("key_hash")
            .map_err(|e| AppError::database(e.to_string()))?,
        description: description.unwrap_or_default(),
        is_active: is_active == 1,
        created_at,
        last_used_at,
    })
}

#[async_trait]
impl ApiKeyRepository for Catalog {
    async fn create(&self, key: &ApiKey) -> AppResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO api_keys (user_id, key_prefix, key_hash, description, created_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(key.user_id)
        .bind(&key.key_prefix)
        .bind(&key.key_hash)
        .bind(&key.description)
        .bind(key.created_at)
        .bind(i64::from(key.is_active))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create api key: {e}")))?;
        Ok(result.last_insert_rowid())
    }

    async fn by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, key_prefix, key_hash, description, created_at, last_used_at, is_active
            FROM api_keys
            WHERE key_hash = ? AND is_active = 1
            ",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to look up api key: {e}")))?;
        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn list(&self) -> AppResult<Vec<ApiKey>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, key_prefix, key_hash, description, created_at, last_used_at, is_active
            FROM api_keys
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to list api keys: {e}")))?;
        rows.iter().map(row_to_api_key).collect()
    }

    async fn revoke(&self, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to revoke api key: {e}")))?;
        Ok(())
    }

    async fn touch_last_used(&self, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to update last_used_at: {e}")))?;
        Ok(())
    }
}
