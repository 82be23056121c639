// ABOUTME: Authenticated symmetric encryption for secrets at rest
// ABOUTME: AES-256-GCM with a random nonce per message, base64 on the wire
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::{AppError, AppResult};

/// Encrypts and decrypts stored connection strings.
///
/// The key is the first 32 bytes of the configured master secret. Output is
/// `base64(nonce || ciphertext || tag)`; any tampering, truncation, or wrong
/// key fails with [`AppError::DecryptionFailure`].
pub struct SecretCipher {
    key: [u8; 32],
    rng: SystemRandom,
}

impl SecretCipher {
    /// Builds a cipher from the master secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn new(master_key: &str) -> AppResult<Self> {
        let bytes = master_key.as_bytes();
        if bytes.len() < 32 {
            return Err(AppError::internal(
                "encryption key must be at least 32 characters",
            ));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[..32]);
        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    /// Encrypts `plaintext`, returning base64(nonce || ciphertext || tag).
    ///
    /// # Errors
    ///
    /// Returns an error if nonce generation or sealing fails.
    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|e| AppError::internal(format!("failed to create encryption key: {e}")))?;
        let key = LessSafeKey::new(unbound);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|e| AppError::internal(format!("failed to generate nonce: {e}")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut ciphertext = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut ciphertext)
            .map_err(|e| AppError::internal(format!("encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(&combined))
    }

    /// Reverses [`Self::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DecryptionFailure`] on bad base64, input shorter
    /// than the nonce, authentication-tag mismatch, or non-UTF-8 plaintext.
    pub fn decrypt(&self, encoded: &str) -> AppResult<String> {
        let combined = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| AppError::DecryptionFailure)?;

        if combined.len() < NONCE_LEN {
            return Err(AppError::DecryptionFailure);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::assume_unique_for_key(
            nonce_bytes.try_into().map_err(|_| AppError::DecryptionFailure)?,
        );

        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| AppError::DecryptionFailure)?;
        let key = LessSafeKey::new(unbound);

        let mut buf = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| AppError::DecryptionFailure)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| AppError::DecryptionFailure)
    }
}
