// ABOUTME: Repository traits over the embedded catalog store
// ABOUTME: The execution core depends only on these behaviors, not the engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::{ApiKey, AuditLog, DbConnection, SavedQuery, User};

mod api_keys;
mod audit;
mod connections;
mod queries;
mod store;
mod users;

pub use store::Catalog;

/// Storage operations for target database connections
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Inserts a connection, returning its id.
    async fn create(&self, conn: &DbConnection) -> AppResult<i64>;
    async fn by_id(&self, id: i64) -> AppResult<Option<DbConnection>>;
    /// Exact-name lookup; slug resolution lives in the executor.
    async fn by_name(&self, name: &str) -> AppResult<Option<DbConnection>>;
    async fn list(&self) -> AppResult<Vec<DbConnection>>;
    async fn update(&self, conn: &DbConnection) -> AppResult<()>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

/// Storage operations for saved queries, including the connection allow-list
#[async_trait]
pub trait QueryRepository: Send + Sync {
    /// Inserts a query and its allow-list rows, returning the query id.
    async fn create(&self, query: &SavedQuery) -> AppResult<i64>;
    async fn by_id(&self, id: i64) -> AppResult<Option<SavedQuery>>;
    async fn by_slug(&self, slug: &str) -> AppResult<Option<SavedQuery>>;
    async fn list(&self) -> AppResult<Vec<SavedQuery>>;
    async fn update(&self, query: &SavedQuery) -> AppResult<()>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

/// Storage operations for administrator accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &str, password_hash: &str) -> AppResult<User>;
    async fn by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn list(&self) -> AppResult<Vec<User>>;
    async fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()>;
    async fn count(&self) -> AppResult<i64>;
}

/// Storage operations for API keys
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Inserts a key record, returning its id.
    async fn create(&self, key: &ApiKey) -> AppResult<i64>;
    /// Hash lookup over active keys only; a revoked hash never matches.
    async fn by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>>;
    async fn list(&self) -> AppResult<Vec<ApiKey>>;
    async fn revoke(&self, id: i64) -> AppResult<()>;
    async fn touch_last_used(&self, id: i64) -> AppResult<()>;
}

/// Append-only storage for execution audit rows
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, entry: &AuditLog) -> AppResult<i64>;
    /// Most recent rows with display fields joined on, newest first,
    /// timestamps in the process-local zone.
    async fn recent(&self, limit: i64) -> AppResult<Vec<AuditLog>>;
    /// Deletes everything but the newest `keep` rows, returning the count
    /// removed.
    async fn prune(&self, keep: i64) -> AppResult<u64>;
}
