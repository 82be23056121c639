// ABOUTME: Process configuration from the environment and the .env file
// ABOUTME: Generates and persists a master key when none is configured
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use tracing::warn;

use crate::errors::AppResult;

/// Default drivers surfaced in the admin UI when `SUPPORTED_DRIVERS` is unset.
/// Display-only; the executor dispatches on the stored driver tag.
const DEFAULT_DRIVERS: &[&str] = &[
    "Sql Anywhere 10",
    "PostgreSQL",
    "MySQL",
    "SQLite",
    "SQL Server",
];

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`PORT`, default 8080)
    pub port: u16,
    /// Master secret for the connection-string cipher (`DBBRIDGE_KEY`)
    pub master_key: String,
    /// Catalog store path (`DBBRIDGE_DB`, default `dbbridge.db`)
    pub catalog_path: String,
    /// Display list of installable drivers (`SUPPORTED_DRIVERS`)
    pub supported_drivers: Vec<String>,
}

impl Config {
    /// Loads configuration, generating and persisting a master key if the
    /// configured one is missing or shorter than 32 characters.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails. A failure to persist the
    /// generated key to `.env` is logged but not fatal.
    pub fn load() -> AppResult<Self> {
        // Best-effort; absence of .env is normal
        let _ = dotenvy::dotenv();

        let mut master_key = env::var("DBBRIDGE_KEY").unwrap_or_default();
        if master_key.len() < 32 {
            warn!("DBBRIDGE_KEY not found or too short; generating a new secure key");
            master_key = generate_key();
            if let Err(e) = save_key_to_env(Path::new(".env"), &master_key) {
                warn!(error = %e, "failed to save generated key to .env");
            }
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let catalog_path =
            env::var("DBBRIDGE_DB").unwrap_or_else(|_| "dbbridge.db".to_owned());

        let supported_drivers = match env::var("SUPPORTED_DRIVERS") {
            Ok(list) if !list.trim().is_empty() => list
                .split(',')
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty())
                .collect(),
            _ => DEFAULT_DRIVERS.iter().map(|d| (*d).to_owned()).collect(),
        };

        Ok(Self {
            port,
            master_key,
            catalog_path,
            supported_drivers,
        })
    }
}

/// 32 random bytes, base64-encoded so the key is printable.
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::STANDARD.encode(bytes)
}

/// Writes `DBBRIDGE_KEY` into the env file, creating it if absent.
///
/// Editors on Windows sometimes rewrite `.env` as UTF-16LE (with or without a
/// BOM); the file is healed back to UTF-8 in that case so the key line can be
/// replaced instead of appended as mojibake.
fn save_key_to_env(path: &Path, key: &str) -> io::Result<()> {
    let content = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return fs::write(path, format!("DBBRIDGE_KEY={key}\nPORT=8080\n"));
        }
        Err(e) => return Err(e),
    };

    let text = decode_env_bytes(&content);

    let mut lines: Vec<String> = Vec::new();
    let mut found = false;
    for line in text.split('\n') {
        let cleaned = line.trim().trim_matches('\u{0}').replace('\u{0}', "");
        if cleaned.starts_with("DBBRIDGE_KEY=") {
            lines.push(format!("DBBRIDGE_KEY={key}"));
            found = true;
        } else if !cleaned.is_empty() {
            lines.push(cleaned);
        }
    }
    if !found {
        lines.push(format!("DBBRIDGE_KEY={key}"));
    }

    fs::write(path, lines.join("\n"))
}

/// Decodes env-file bytes, healing UTF-16LE content (BOM-marked, or implied
/// by a high null-byte ratio) back to a UTF-8 string.
fn decode_env_bytes(content: &[u8]) -> String {
    let has_bom = content.len() >= 2 && content[0] == 0xff && content[1] == 0xfe;
    let null_ratio = if content.len() > 10 {
        let nulls = content.iter().filter(|b| **b == 0).count();
        nulls as f64 / content.len() as f64
    } else {
        0.0
    };
    let implicit_utf16 = !has_bom && !content.is_empty() && null_ratio > 0.3;

    if has_bom || implicit_utf16 {
        let start = if has_bom { 2 } else { 0 };
        let mut data = &content[start..];
        if data.len() % 2 != 0 {
            data = &data[..data.len() - 1];
        }
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(content).into_owned()
    }
}
