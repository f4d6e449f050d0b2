//! # Vitrina Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  config (defaults → vitrina.toml → VITRINA_*)                           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  SQLite pool + migrations ──► built-in roles / first admin              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  axum on bind_addr:http_port ──► graceful shutdown on Ctrl+C / SIGTERM  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vitrina_db::{bootstrap, Database, DbConfig};
use vitrina_server::{app, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vitrina=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    info!("Starting Vitrina server...");

    let config = ServerConfig::load().context("loading configuration")?;
    let addr = config.socket_addr()?;
    info!(
        %addr,
        database = %config.database_path,
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("Using the development JWT secret; set VITRINA_JWT_SECRET in production");
    }

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.max_connections),
    )
    .await
    .context("opening database")?;

    let seed = config.admin_seed();
    let setup = bootstrap(&db, seed.as_ref())
        .await
        .context("bootstrapping roles and administrator")?;
    info!(roles = setup.roles.len(), "Built-in roles ready");

    let state = AppState::new(db.clone(), config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
