//! MFT server: scheduled managed file transfers.
//!
//! Main entry point that wires all crates together and starts the engine,
//! the housekeeping scheduler and the admin API.

use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use mft_api::AppState;
use mft_core::config::AppConfig;
use mft_core::error::AppError;
use mft_database::Stores;
use mft_worker::{Engine, Housekeeper, MaintenanceScheduler};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load `config/default`, the `config/{MFT_ENV}` overlay and `MFT__*`
/// variables. `MFT_CONFIG` names a single file instead.
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("MFT_CONFIG") {
        Ok(path) => AppConfig::load_from(&path),
        Err(_) => {
            let env = std::env::var("MFT_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MFT engine v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Stores (migrations run on connect) ───────────────
    let stores = Stores::open(&config.database).await?;

    // ── Step 2: Engine and job registration ──────────────────────
    let engine = Engine::with_default_providers(&config, stores.clone())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tick_handle = engine.start(shutdown_rx.clone()).await?;
    tracing::info!("{} job(s) scheduled", engine.scheduler.len());

    // ── Step 3: Housekeeping ─────────────────────────────────────
    let housekeeper = Housekeeper::new(&stores, config.housekeeping.history_retention_days);
    let maintenance = MaintenanceScheduler::new(housekeeper, config.housekeeping.clone()).await?;
    maintenance.start().await?;

    // ── Step 4: Admin API ────────────────────────────────────────
    let api_handle = if config.server.api_enabled {
        let state = AppState::new(config.clone(), engine.clone());
        let api_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = mft_api::serve(state, api_shutdown).await {
                tracing::error!("API server error: {}", e);
            }
        }))
    } else {
        tracing::info!("Admin API disabled");
        None
    };

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    if let Some(handle) = api_handle {
        let _ = tokio::time::timeout(grace, handle).await;
    }
    let _ = tick_handle.await;
    engine.shutdown().await;
    if let Err(e) = maintenance.shutdown().await {
        tracing::warn!("Housekeeping shutdown failed: {}", e);
    }
    stores.close().await;

    tracing::info!("MFT engine shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
