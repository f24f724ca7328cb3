//! Greenlight Service - HTTP API for movies, catalog translations and users
//!
//! This is the main entry point for the greenlight service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greenlight_service::{create_router, AppState, ServiceConfig};
use greenlight_store::{MemoryStore, PgStore, Store};

/// How often idle rate limit clients are swept.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for background tasks.
const BACKGROUND_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,greenlight=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Greenlight Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        environment = %config.environment,
        database_configured = %config.database_url.is_some(),
        rate_limit_enabled = %config.rate_limit.enabled,
        "Service configuration loaded"
    );

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL");
            Arc::new(PgStore::connect(url, config.store_config()).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set - using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Build app state
    let state = AppState::new(store, config.clone());
    let sweeper = state.limiter.spawn_sweeper(LIMITER_SWEEP_INTERVAL);
    let background = state.background.clone();

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    if !background.shutdown(BACKGROUND_DRAIN_TIMEOUT).await {
        tracing::warn!("Exiting with background tasks still running");
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
