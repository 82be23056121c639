// ABOUTME: Shared test utilities: in-memory catalog, seeded fixtures, router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::NamedTempFile;

use dbbridge::auth::AuthService;
use dbbridge::catalog::{
    ApiKeyRepository, AuditRepository, Catalog, ConnectionRepository, QueryRepository,
    UserRepository,
};
use dbbridge::crypto::SecretCipher;
use dbbridge::executor::QueryExecutor;
use dbbridge::models::{DbConnection, SavedQuery};
use dbbridge::rate_limit::RateLimiter;
use dbbridge::routes::{ApiRoutes, AppState};

/// 32-character master key for the test cipher
pub const TEST_MASTER_KEY: &str = "test-master-key-0123456789abcdef";

/// Everything a test needs to drive the execution pipeline
pub struct TestHarness {
    pub catalog: Arc<Catalog>,
    pub connections: Arc<dyn ConnectionRepository>,
    pub queries: Arc<dyn QueryRepository>,
    pub users: Arc<dyn UserRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub cipher: Arc<SecretCipher>,
    pub executor: QueryExecutor,
    pub auth: AuthService,
}

pub async fn create_harness() -> TestHarness {
    let catalog = Arc::new(Catalog::connect(":memory:").await.expect("catalog"));
    let cipher = Arc::new(SecretCipher::new(TEST_MASTER_KEY).expect("cipher"));

    let connections: Arc<dyn ConnectionRepository> = catalog.clone();
    let queries: Arc<dyn QueryRepository> = catalog.clone();
    let users: Arc<dyn UserRepository> = catalog.clone();
    let api_keys: Arc<dyn ApiKeyRepository> = catalog.clone();
    let audit: Arc<dyn AuditRepository> = catalog.clone();

    let executor = QueryExecutor::new(
        connections.clone(),
        queries.clone(),
        audit.clone(),
        cipher.clone(),
    );
    let auth = AuthService::new(users.clone(), api_keys.clone());

    TestHarness {
        catalog,
        connections,
        queries,
        users,
        api_keys,
        audit,
        cipher,
        executor,
        auth,
    }
}

impl TestHarness {
    /// Builds the public router over this harness with the given rate limits.
    pub fn router(&self, rate_per_minute: f64, burst: u32) -> Router {
        let state = AppState {
            executor: self.executor.clone(),
            auth: self.auth.clone(),
            connections: self.connections.clone(),
            queries: self.queries.clone(),
            limiter: RateLimiter::new(rate_per_minute, burst),
            port: 8080,
        };
        ApiRoutes::router(state)
    }

    /// Stores a connection whose string is encrypted with the test cipher.
    pub async fn seed_connection(
        &self,
        name: &str,
        driver: &str,
        connection_string: &str,
        is_active: bool,
    ) -> i64 {
        let enc = self.cipher.encrypt(connection_string).expect("encrypt");
        self.connections
            .create(&DbConnection {
                id: 0,
                name: name.to_owned(),
                driver: driver.to_owned(),
                connection_string_enc: enc,
                is_active,
            })
            .await
            .expect("seed connection")
    }

    pub async fn seed_query(
        &self,
        slug: &str,
        sql_text: &str,
        allowed_connection_ids: &[i64],
        is_active: bool,
    ) -> i64 {
        self.queries
            .create(&SavedQuery {
                id: 0,
                slug: slug.to_owned(),
                description: String::new(),
                sql_text: sql_text.to_owned(),
                params_config: String::new(),
                is_active,
                allowed_connection_ids: allowed_connection_ids.to_vec(),
            })
            .await
            .expect("seed query")
    }

    /// Creates an admin user plus an API key, returning the key plaintext.
    pub async fn seed_api_key(&self) -> String {
        let user = self
            .auth
            .setup_admin("admin", "correct horse battery staple")
            .await
            .expect("setup admin");
        let (plaintext, _) = self
            .auth
            .generate_api_key(user.id, "test key")
            .await
            .expect("generate key");
        plaintext
    }
}

/// Creates a file-backed sqlite database seeded by `statements`, returning
/// the tempfile guard (keep it alive) and the path.
pub async fn seed_target_database(statements: &[&str]) -> (NamedTempFile, String) {
    let file = NamedTempFile::new().expect("tempfile");
    let path = file.path().to_str().expect("utf-8 path").to_owned();

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .expect("seed connect");
    for statement in statements {
        sqlx::query(statement)
            .execute(&mut conn)
            .await
            .expect("seed statement");
    }
    conn.close().await.expect("seed close");

    (file, path)
}
