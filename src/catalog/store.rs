// ABOUTME: Sqlite-backed catalog store and its startup migrations
// ABOUTME: Adds columns introduced after first release via PRAGMA checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Embedded catalog store holding users, api keys, connections, queries, and
/// audit rows. Satisfies every repository trait in [`crate::catalog`].
#[derive(Clone)]
pub struct Catalog {
    pub(crate) pool: SqlitePool,
}

impl Catalog {
    /// Opens (creating if needed) the catalog database and runs migrations.
    ///
    /// Accepts a plain file path, `:memory:`, or a full `sqlite:` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn connect(path: &str) -> AppResult<Self> {
        let base = if path.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(path)
                .map_err(|e| AppError::database(format!("invalid catalog path: {e}")))?
        } else if path == ":memory:" {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new().filename(path)
        };
        let options = base.create_if_missing(true).foreign_keys(true);

        // An in-memory catalog lives and dies with a single connection, so
        // the pool must never open a second one or drop the first.
        let in_memory = path.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("failed to open catalog: {e}")))?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        info!(path, "catalog store ready");
        Ok(catalog)
    }

    /// Creates the base schema and applies additive column migrations.
    async fn migrate(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                is_active INTEGER DEFAULT 1
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                key_prefix TEXT NOT NULL,
                key_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                last_used_at DATETIME,
                is_active INTEGER DEFAULT 1,
                FOREIGN KEY(user_id) REFERENCES users(id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                driver TEXT NOT NULL,
                connection_string_enc TEXT NOT NULL,
                is_active INTEGER DEFAULT 1
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                description TEXT,
                sql_text TEXT NOT NULL,
                params_config TEXT,
                is_active INTEGER DEFAULT 1
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                user_id INTEGER,
                connection_id INTEGER,
                query_id INTEGER,
                duration_ms INTEGER,
                status TEXT,
                error_message TEXT
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS query_connections (
                query_id INTEGER NOT NULL,
                connection_id INTEGER NOT NULL,
                PRIMARY KEY (query_id, connection_id),
                FOREIGN KEY (query_id) REFERENCES queries(id) ON DELETE CASCADE,
                FOREIGN KEY (connection_id) REFERENCES connections(id) ON DELETE CASCADE
            )
            ",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("migration failed: {e}")))?;
        }

        // Columns added after first release; old catalog files gain them here
        self.add_column_if_missing("api_keys", "description", "TEXT")
            .await?;
        self.add_column_if_missing("audit_logs", "api_key_id", "INTEGER")
            .await?;
        self.add_column_if_missing("audit_logs", "params", "TEXT")
            .await?;

        Ok(())
    }

    async fn add_column_if_missing(
        &self,
        table: &str,
        column: &str,
        sql_type: &str,
    ) -> AppResult<()> {
        if self.column_exists(table, column).await? {
            return Ok(());
        }
        let statement = format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}");
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to add {table}.{column}: {e}")))?;
        Ok(())
    }

    async fn column_exists(&self, table: &str, column: &str) -> AppResult<bool> {
        let statement = format!("PRAGMA table_info({table})");
        let rows = sqlx::query(&statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("pragma failed: {e}")))?;
        for row in rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| AppError::database(e.to_string()))?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
