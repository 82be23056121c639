// ABOUTME: Administrator bootstrap and the API key lifecycle
// ABOUTME: Key plaintext exists only at generation time; storage keeps the hash
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::catalog::{ApiKeyRepository, UserRepository};
use crate::errors::{AppError, AppResult};
use crate::models::{ApiKey, User};

/// Hex length of a plaintext key (32 random bytes)
const KEY_HEX_LEN: usize = 64;
/// Display prefix stored alongside the hash
const KEY_PREFIX_LEN: usize = 8;

/// Account and API key service over the catalog repositories.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    api_keys: Arc<dyn ApiKeyRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, api_keys: Arc<dyn ApiKeyRepository>) -> Self {
        Self { users, api_keys }
    }

    /// Creates the first administrator. Refused once any user exists.
    ///
    /// # Errors
    ///
    /// Returns an error if setup already completed, hashing fails, or the
    /// catalog write fails.
    pub async fn setup_admin(&self, username: &str, password: &str) -> AppResult<User> {
        if self.users.count().await? > 0 {
            return Err(AppError::internal("setup already completed"));
        }
        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;
        self.users.create(username, &password_hash).await
    }

    /// Verifies administrator credentials without revealing which of the
    /// username or password was wrong.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown user or password mismatch.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<User> {
        let user = self
            .users
            .by_username(username)
            .await?
            .ok_or_else(|| AppError::internal("invalid credentials"))?;
        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| AppError::internal(format!("password verification failed: {e}")))?;
        if !matches {
            return Err(AppError::internal("invalid credentials"));
        }
        Ok(user)
    }

    /// Rehashes and stores a new password for the named user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or hashing fails.
    pub async fn reset_password(&self, username: &str, new_password: &str) -> AppResult<()> {
        let user = self
            .users
            .by_username(username)
            .await?
            .ok_or_else(|| AppError::internal(format!("user not found: {username}")))?;
        let password_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;
        self.users.update_password(user.id, &password_hash).await
    }

    /// Generates an API key for a user.
    ///
    /// Returns the plaintext (shown once, never stored) and the persisted
    /// record. The stored prefix is the first 8 hex characters; the stored
    /// hash is the SHA-256 hex digest of the full plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog write fails.
    pub async fn generate_api_key(
        &self,
        user_id: i64,
        description: &str,
    ) -> AppResult<(String, ApiKey)> {
        let mut bytes = [0u8; KEY_HEX_LEN / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = hex::encode(bytes);

        let mut key = ApiKey {
            id: 0,
            user_id,
            key_prefix: plaintext[..KEY_PREFIX_LEN].to_owned(),
            key_hash: hash_key(&plaintext),
            description: description.to_owned(),
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
        };
        key.id = self.api_keys.create(&key).await?;
        Ok((plaintext, key))
    }

    /// Verifies a presented API key against the stored hashes.
    ///
    /// On a hit, `last_used_at` is updated in the background; a failed update
    /// never rejects the request.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidApiKey`] when no active key matches.
    pub async fn verify_api_key(&self, plaintext: &str) -> AppResult<ApiKey> {
        let key = self
            .api_keys
            .by_hash(&hash_key(plaintext))
            .await?
            .ok_or(AppError::InvalidApiKey)?;

        let repo = Arc::clone(&self.api_keys);
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(e) = repo.touch_last_used(key_id).await {
                warn!(key_id, error = %e, "failed to update api key last_used_at");
            }
        });

        Ok(key)
    }

    /// Deactivates a key; its hash never matches again.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog write fails.
    pub async fn revoke_api_key(&self, id: i64) -> AppResult<()> {
        self.api_keys.revoke(id).await
    }
}

/// SHA-256 hex digest of a plaintext key.
#[must_use]
pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}
