// ABOUTME: Library entry point for the DbBridge SQL-to-HTTP bridge
// ABOUTME: Exposes the query translation core, catalog store, and HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

#![deny(unsafe_code)]

//! # DbBridge
//!
//! DbBridge turns a catalog of administrator-curated SQL statements into a
//! uniform HTTP/JSON API. Each public endpoint is
//! `POST /api/{connection}/{query}` with a JSON body of named parameters; the
//! service looks up the connection and query by slug, binds parameters into
//! the stored SQL, runs it against the target database, and returns rows as
//! JSON.
//!
//! ## Architecture
//!
//! - **`sql`**: the parameter grammar and dialect translation engine
//! - **`catalog`**: repository traits over the embedded catalog store
//! - **`executor`**: the authenticated, audited execution pipeline
//! - **`drivers`**: per-dialect connect/bind/materialize backends
//! - **`routes`**: the axum HTTP surface and live OpenAPI document

/// Administrator bootstrap and API key lifecycle
pub mod auth;

/// Catalog repositories (connections, queries, users, api keys, audit)
pub mod catalog;

/// Process configuration loaded from the environment and `.env`
pub mod config;

/// Secret-at-rest encryption for stored connection strings
pub mod crypto;

/// Per-dialect database backends
pub mod drivers;

/// Application error type and HTTP status mapping
pub mod errors;

/// Query execution pipeline
pub mod executor;

/// Data model shared across the catalog and the executor
pub mod models;

/// Token-bucket rate limiting
pub mod rate_limit;

/// HTTP routes and middleware
pub mod routes;

/// SQL parameter grammar, pagination rewrite, and driver dispatch
pub mod sql;

/// Small shared helpers
pub mod utils;
