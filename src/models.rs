// ABOUTME: Data model shared by the catalog store, executor, and HTTP surface
// ABOUTME: Identifiers are opaque integers; slugs are the URL-visible keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Administrator account that owns API keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// API key record; the plaintext exists only at creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    /// First 8 hex characters of the plaintext, for display
    pub key_prefix: String,
    /// SHA-256 hex digest of the plaintext
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Target database connection; the connection string never leaves the cipher
/// boundary in plaintext
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConnection {
    pub id: i64,
    /// Unique, slug-form name
    pub name: String,
    /// Driver tag: sqlite, postgres, mysql, mssql, or odbc
    pub driver: String,
    #[serde(skip_serializing)]
    pub connection_string_enc: String,
    pub is_active: bool,
}

/// Catalog entry pairing an SQL template with an allow-list of connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: i64,
    pub slug: String,
    pub description: String,
    pub sql_text: String,
    /// JSON describing expected params, surfaced in the admin path only
    pub params_config: String,
    pub is_active: bool,
    pub allowed_connection_ids: Vec<i64>,
}

impl SavedQuery {
    /// Whether this query may run against the given connection.
    #[must_use]
    pub fn allows_connection(&self, connection_id: i64) -> bool {
        self.allowed_connection_ids.contains(&connection_id)
    }
}

/// Outcome recorded on an audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "ERROR")]
    Error,
}

impl AuditStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }
}

/// Append-only record describing one execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub timestamp: DateTime<Local>,
    pub user_id: i64,
    pub api_key_id: Option<i64>,
    pub connection_id: i64,
    /// 0 for ad-hoc SQL that has no catalog entry
    pub query_id: i64,
    pub duration_ms: i64,
    pub status: String,
    pub error_message: String,
    /// Request parameters serialized as JSON
    pub params: String,
    /// Joined display fields, populated by `recent` only
    #[serde(default)]
    pub api_key_prefix: String,
    #[serde(default)]
    pub connection_name: String,
    #[serde(default)]
    pub query_slug: String,
}

/// Buffered result of one query execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Column names in select order
    pub columns: Vec<String>,
    /// One name→value map per row, preserving column order
    pub rows: Vec<Map<String, Value>>,
}
