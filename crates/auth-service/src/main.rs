//! Auth Service
//!
//! Entry point for the Picshot authentication gateway. Validates bearer
//! tokens on every request and publishes this service's signing keys.

use auth_service::auth::{OAuthOptions, OAuthValidator, TokenSigner};
use auth_service::config::Config;
use auth_service::observability::init_metrics_recorder;
use auth_service::routes::{self, AppState};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Auth Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        jwks_validity_frequency_seconds = config.jwks_validity_frequency.as_secs(),
        token_source = ?config.token_source,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let signer = TokenSigner::from_config(&config).map_err(|e| {
        error!("Failed to load signing key: {}", e);
        e
    })?;
    info!(algorithm = ?signer.algorithm(), "Token signer ready");

    let validator = Arc::new(
        OAuthValidator::new(OAuthOptions::from_config(&config), config.token_source).map_err(
            |e| {
                error!("Failed to create token validator: {}", e);
                e
            },
        )?,
    );

    // A failed first fetch is retried in the background; requests are
    // rejected with "key not found" until keys arrive.
    match validator.start().await {
        Ok(key_count) => info!(key_count, "Initial JWKS loaded"),
        Err(e) => warn!(error = %e, "Initial JWKS fetch failed, retrying in background"),
    }

    let bind_address = config.bind_address.clone();
    let drain_period = config.drain_period;

    let state = Arc::new(AppState::new(config, signer, Arc::clone(&validator)));

    // Business routes are mounted by the embedding service
    let app = routes::build_routes(state, Router::new(), metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Auth Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_period))
    .await?;

    validator.stop().await;

    info!("Auth Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_period.is_zero() {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}
