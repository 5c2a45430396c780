//! KV Storage - a key/value storage tier
//!
//! Binary entry point: loads configuration, selects the backend and serves
//! the HTTP API until SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::Context as _;
use tokio::{signal, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_storage::{create_router, storage, AppState, Config, StorageService};

/// Main entry point for the storage server.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing subscriber at the configured level
/// 3. Build the selected storage backend
/// 4. Create Axum router with all endpoints
/// 5. Serve until SIGINT/SIGTERM, then cancel queued work and close the backend
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    // RUST_LOG wins over LOG_LEVEL when set
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("kv_storage={},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(service = %config.service_name, "Starting storage service");
    info!(
        "Configuration loaded: storage_type={}, port={}",
        config.storage_type, config.server_port
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let backend = storage::build(&config);
    let service = StorageService::new(backend);
    let app = create_router(AppState::new(service.clone(), shutdown_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    service.close();
    info!(service = %config.service_name, "Server shutdown complete");

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown, flips the watch channel so in-flight requests stop waiting
/// for pool connections.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    shutdown_tx.send_replace(true);
}
