// ABOUTME: Administrator account repository backed by the catalog store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{Catalog, UserRepository};
use crate::errors::{AppError, AppResult};
use crate::models::User;

fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    let is_active: i64 = row
        .try_get("is_active")
        .map_err(|e| AppError::database(e.to_string()))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(User {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database(e.to_string()))?,
        username: row
            .try_get("username")
            .map_err(|e| AppError::database(e.to_string()))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|e| AppError::database(e.to_string()))?,
        is_active: is_active == 1,
        created_at,
    })
}

#[async_trait]
impl UserRepository for Catalog {
    async fn create(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r"
            INSERT INTO users (username, password_hash, created_at, is_active)
            VALUES (?, ?, ?, 1)
            ",
        )
        .bind(username)
        .bind(password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create user: {e}")))?;
        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
            is_active: true,
            created_at,
        })
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at, is_active FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get user: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at, is_active FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get user: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, username, password_hash, created_at, is_active FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to list users: {e}")))?;
        rows.iter().map(row_to_user).collect()
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to update password: {e}")))?;
        Ok(())
    }

    async fn count(&self) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to count users: {e}")))?;
        row.try_get("n").map_err(|e| AppError::database(e.to_string()))
    }
}
