// ABOUTME: Server binary: config, catalog, services, HTTP listener, shutdown
// ABOUTME: Subcommands: none (serve), reset-password, help
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dbbridge::auth::AuthService;
use dbbridge::catalog::{
    ApiKeyRepository, AuditRepository, Catalog, ConnectionRepository, QueryRepository,
    UserRepository,
};
use dbbridge::config::Config;
use dbbridge::crypto::SecretCipher;
use dbbridge::executor::QueryExecutor;
use dbbridge::rate_limit::RateLimiter;
use dbbridge::routes::{ApiRoutes, AppState};

/// Audit retention cap enforced by the background sweep
const AUDIT_RETENTION_ROWS: i64 = 1000;
/// How often the audit sweep runs
const AUDIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "reset-password" => {
                handle_reset_password(&args[2..]).await;
                return;
            }
            "help" | "--help" | "-h" => {
                print_help();
                return;
            }
            other => {
                eprintln!("Unknown command: {other}");
                print_help();
                process::exit(1);
            }
        }
    }

    start_server().await;
}

fn print_help() {
    println!("DbBridge - Database Bridge Server");
    println!();
    println!("Usage:");
    println!("  dbbridge                           Start the server");
    println!("  dbbridge reset-password -u <user>  Reset user password (interactive)");
    println!("  dbbridge help                      Show this help");
}

async fn handle_reset_password(args: &[String]) {
    let username = match args {
        [flag, name, ..] if flag == "-u" => name.clone(),
        _ => {
            eprintln!("Usage: dbbridge reset-password -u <username>");
            process::exit(1);
        }
    };

    let password = prompt("New password: ");
    let confirm = prompt("Confirm password: ");
    if password != confirm {
        eprintln!("Passwords do not match.");
        process::exit(1);
    }
    if password.is_empty() {
        eprintln!("Password cannot be empty.");
        process::exit(1);
    }

    let config = load_config_or_exit();
    let catalog = connect_catalog_or_exit(&config).await;
    let users: Arc<dyn UserRepository> = catalog.clone();
    let api_keys: Arc<dyn ApiKeyRepository> = catalog;
    let auth = AuthService::new(users, api_keys);

    if let Err(e) = auth.reset_password(&username, &password).await {
        eprintln!("Failed to reset password: {e}");
        process::exit(1);
    }
    println!("Password for user '{username}' has been reset successfully.");
}

fn prompt(label: &str) -> String {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim_end_matches(['\r', '\n']).to_owned()
}

fn load_config_or_exit() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Failed to load config: {e}\nCheck .env file or DBBRIDGE_KEY environment variable."
            );
            process::exit(1);
        }
    }
}

async fn connect_catalog_or_exit(config: &Config) -> Arc<Catalog> {
    match Catalog::connect(&config.catalog_path).await {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            eprintln!("Failed to init database: {e}");
            process::exit(1);
        }
    }
}

async fn start_server() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dbbridge=info,tower_http=info")),
        )
        .init();
    info!("starting DbBridge");

    let config = load_config_or_exit();
    info!(drivers = ?config.supported_drivers, "supported drivers");

    let catalog = connect_catalog_or_exit(&config).await;

    let cipher = match SecretCipher::new(&config.master_key) {
        Ok(cipher) => Arc::new(cipher),
        Err(e) => {
            error!("failed to init crypto service: {e}");
            process::exit(1);
        }
    };

    let connections: Arc<dyn ConnectionRepository> = catalog.clone();
    let queries: Arc<dyn QueryRepository> = catalog.clone();
    let users: Arc<dyn UserRepository> = catalog.clone();
    let api_keys: Arc<dyn ApiKeyRepository> = catalog.clone();
    let audit: Arc<dyn AuditRepository> = catalog.clone();

    let executor = QueryExecutor::new(
        connections.clone(),
        queries.clone(),
        audit.clone(),
        cipher,
    );
    let auth = AuthService::new(users, api_keys);

    // 60 requests/minute sustained, bursts of 10, per API key
    let limiter = RateLimiter::new(60.0, 10);
    limiter.spawn_sweeper();

    spawn_audit_sweeper(audit.clone());

    let state = AppState {
        executor,
        auth,
        connections,
        queries,
        limiter,
        port: config.port,
    };
    let app = ApiRoutes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("server startup failed: {e}");
            process::exit(1);
        }
    };
    info!(port = config.port, "server listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = served {
        error!("server error: {e}");
        process::exit(1);
    }
    info!("server stopped");
}

/// Keeps the audit table near its retention cap. Best-effort between ticks.
fn spawn_audit_sweeper(audit: Arc<dyn AuditRepository>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(AUDIT_SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = audit.prune(AUDIT_RETENTION_ROWS).await {
                error!(error = %e, "audit retention sweep failed");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install shutdown handler: {e}");
    }
    info!("shutting down server");
}
