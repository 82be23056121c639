// ABOUTME: Connection repository backed by the catalog store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{Catalog, ConnectionRepository};
use crate::errors::{AppError, AppResult};
use crate::models::DbConnection;

fn row_to_connection(row: &SqliteRow) -> AppResult<DbConnection> {
    let is_active: i64 = row
        .try_get("is_active")
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(DbConnection {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database(e.to_string()))?,
        driver: row
            .try_get("driver")
            .map_err(|e| AppError::database(e.to_string()))?,
        connection_string_enc: row
            .try_get("connection_string_enc")
            .map_err(|e| AppError::database(e.to_string()))?,
        is_active: is_active == 1,
    })
}

#[async_trait]
impl ConnectionRepository for Catalog {
    async fn create(&self, conn: &DbConnection) -> AppResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO connections (name, driver, connection_string_enc, is_active)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(&conn.name)
        .bind(&conn.driver)
        .bind(&conn.connection_string_enc)
        .bind(i64::from(conn.is_active))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create connection: {e}")))?;
        Ok(result.last_insert_rowid())
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<DbConnection>> {
        let row = sqlx::query(
            r"
            SELECT id, name, driver, connection_string_enc, is_active
            FROM connections WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get connection: {e}")))?;
        row.as_ref().map(row_to_connection).transpose()
    }

    async fn by_name(&self, name: &str) -> AppResult<Option<DbConnection>> {
        let row = sqlx::query(
            r"
            SELECT id, name, driver, connection_string_enc, is_active
            FROM connections WHERE name = ?
            ",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get connection: {e}")))?;
        row.as_ref().map(row_to_connection).transpose()
    }

    async fn list(&self) -> AppResult<Vec<DbConnection>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, driver, connection_string_enc, is_active
            FROM connections ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to list connections: {e}")))?;
        rows.iter().map(row_to_connection).collect()
    }

    async fn update(&self, conn: &DbConnection) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE connections
            SET name = ?, driver = ?, connection_string_enc = ?, is_active = ?
            WHERE id = ?
            ",
        )
        .bind(&conn.name)
        .bind(&conn.driver)
        .bind(&conn.connection_string_enc)
        .bind(i64::from(conn.is_active))
        .bind(conn.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to update connection: {e}")))?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to delete connection: {e}")))?;
        Ok(())
    }
}
