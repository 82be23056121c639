// ABOUTME: Saved query repository, including the connection allow-list rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{Catalog, QueryRepository};
use crate::errors::{AppError, AppResult};
use crate::models::SavedQuery;

fn row_to_query(row: &SqliteRow) -> AppResult<SavedQuery> {
    let is_active: i64 = row
        .try_get("is_active")
        .map_err(|e| AppError::database(e.to_string()))?;
    let description: Option<String> = row
        .try_get("description")
        .map_err(|e| AppError::database(e.to_string()))?;
    let params_config: Option<String> = row
        .try_get("params_config")
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(SavedQuery {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database(e.to_string()))?,
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database(e.to_string()))?,
        description: description.unwrap_or_default(),
        sql_text: row
            .try_get("sql_text")
            .map_err(|e| AppError::database(e.to_string()))?,
        params_config: params_config.unwrap_or_default(),
        is_active: is_active == 1,
        allowed_connection_ids: Vec::new(),
    })
}

impl Catalog {
    async fn allowed_connection_ids(&self, query_id: i64) -> AppResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT connection_id FROM query_connections WHERE query_id = ? ORDER BY connection_id",
        )
        .bind(query_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to load allow-list: {e}")))?;
        rows.iter()
            .map(|row| {
                row.try_get("connection_id")
                    .map_err(|e| AppError::database(e.to_string()))
            })
            .collect()
    }

    async fn replace_allowed_connections(
        &self,
        query_id: i64,
        connection_ids: &[i64],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM query_connections WHERE query_id = ?")
            .bind(query_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to clear allow-list: {e}")))?;
        for connection_id in connection_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO query_connections (query_id, connection_id) VALUES (?, ?)",
            )
            .bind(query_id)
            .bind(connection_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to insert allow-list row: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl QueryRepository for Catalog {
    async fn create(&self, query: &SavedQuery) -> AppResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO queries (slug, description, sql_text, params_config, is_active)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&query.slug)
        .bind(&query.description)
        .bind(&query.sql_text)
        .bind(&query.params_config)
        .bind(i64::from(query.is_active))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create query: {e}")))?;
        let id = result.last_insert_rowid();
        self.replace_allowed_connections(id, &query.allowed_connection_ids)
            .await?;
        Ok(id)
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<SavedQuery>> {
        let row = sqlx::query(
            r"
            SELECT id, slug, description, sql_text, params_config, is_active
            FROM queries WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get query: {e}")))?;
        let Some(row) = row else { return Ok(None) };
        let mut query = row_to_query(&row)?;
        query.allowed_connection_ids = self.allowed_connection_ids(query.id).await?;
        Ok(Some(query))
    }

    async fn by_slug(&self, slug: &str) -> AppResult<Option<SavedQuery>> {
        let row = sqlx::query(
            r"
            SELECT id, slug, description, sql_text, params_config, is_active
            FROM queries WHERE slug = ?
            ",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get query: {e}")))?;
        let Some(row) = row else { return Ok(None) };
        let mut query = row_to_query(&row)?;
        query.allowed_connection_ids = self.allowed_connection_ids(query.id).await?;
        Ok(Some(query))
    }

    async fn list(&self) -> AppResult<Vec<SavedQuery>> {
        let rows = sqlx::query(
            r"
            SELECT id, slug, description, sql_text, params_config, is_active
            FROM queries ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to list queries: {e}")))?;
        let mut queries = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut query = row_to_query(row)?;
            query.allowed_connection_ids = self.allowed_connection_ids(query.id).await?;
            queries.push(query);
        }
        Ok(queries)
    }

    async fn update(&self, query: &SavedQuery) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE queries
            SET slug = ?, description = ?, sql_text = ?, params_config = ?, is_active = ?
            WHERE id = ?
            ",
        )
        .bind(&query.slug)
        .bind(&query.description)
        .bind(&query.sql_text)
        .bind(&query.params_config)
        .bind(i64::from(query.is_active))
        .bind(query.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to update query: {e}")))?;
        self.replace_allowed_connections(query.id, &query.allowed_connection_ids)
            .await
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM queries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to delete query: {e}")))?;
        Ok(())
    }
}
