// ABOUTME: API key lifecycle tests: generate, verify, revoke, last-used touch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use dbbridge::auth::hash_key;
use dbbridge::errors::AppError;

#[tokio::test]
async fn generated_key_verifies_to_its_record() {
    let harness = common::create_harness().await;
    let user = harness
        .auth
        .setup_admin("admin", "hunter2hunter2")
        .await
        .unwrap();

    let (plaintext, record) = harness
        .auth
        .generate_api_key(user.id, "reporting key")
        .await
        .unwrap();

    assert_eq!(plaintext.len(), 64);
    assert_eq!(record.key_prefix, &plaintext[..8]);
    assert_eq!(record.key_hash, hash_key(&plaintext));
    assert!(record.is_active);

    let verified = harness.auth.verify_api_key(&plaintext).await.unwrap();
    assert_eq!(verified.id, record.id);
    assert_eq!(verified.user_id, user.id);
    assert_eq!(verified.description, "reporting key");
}

#[tokio::test]
async fn unknown_keys_fail_verification() {
    let harness = common::create_harness().await;
    let err = harness
        .auth
        .verify_api_key("definitely-not-a-key")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidApiKey));
}

#[tokio::test]
async fn revoked_keys_never_match_again() {
    let harness = common::create_harness().await;
    let user = harness
        .auth
        .setup_admin("admin", "hunter2hunter2")
        .await
        .unwrap();
    let (plaintext, record) = harness.auth.generate_api_key(user.id, "temp").await.unwrap();

    harness.auth.verify_api_key(&plaintext).await.unwrap();
    harness.auth.revoke_api_key(record.id).await.unwrap();

    let err = harness.auth.verify_api_key(&plaintext).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidApiKey));
}

#[tokio::test]
async fn verification_touches_last_used_in_the_background() {
    let harness = common::create_harness().await;
    let user = harness
        .auth
        .setup_admin("admin", "hunter2hunter2")
        .await
        .unwrap();
    let (plaintext, record) = harness.auth.generate_api_key(user.id, "used").await.unwrap();
    assert!(record.last_used_at.is_none());

    harness.auth.verify_api_key(&plaintext).await.unwrap();

    // The touch is spawned; poll briefly rather than racing it
    let mut touched = false;
    for _ in 0..50 {
        let keys = harness.api_keys.list().await.unwrap();
        if keys.iter().any(|k| k.id == record.id && k.last_used_at.is_some()) {
            touched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(touched, "last_used_at was never updated");
}

#[tokio::test]
async fn setup_admin_is_single_shot() {
    let harness = common::create_harness().await;
    harness
        .auth
        .setup_admin("admin", "hunter2hunter2")
        .await
        .unwrap();
    assert!(harness
        .auth
        .setup_admin("second", "hunter2hunter2")
        .await
        .is_err());

    // Credentials verify without leaking which side failed
    assert!(harness
        .auth
        .authenticate("admin", "hunter2hunter2")
        .await
        .is_ok());
    assert!(harness.auth.authenticate("admin", "wrong").await.is_err());
    assert!(harness.auth.authenticate("ghost", "wrong").await.is_err());
}

#[tokio::test]
async fn reset_password_rehashes() {
    let harness = common::create_harness().await;
    harness
        .auth
        .setup_admin("admin", "first-password")
        .await
        .unwrap();
    harness
        .auth
        .reset_password("admin", "second-password")
        .await
        .unwrap();

    assert!(harness.auth.authenticate("admin", "first-password").await.is_err());
    assert!(harness
        .auth
        .authenticate("admin", "second-password")
        .await
        .is_ok());
}
