//! HTTP routes for the auth service.
//!
//! Defines the Axum router and application state.

use crate::auth::{Jwks, OAuthValidator, TokenSigner};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{authenticate, AuthState, ExemptPaths};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Issues tokens for this service.
    pub signer: Arc<TokenSigner>,

    /// Validates incoming tokens.
    pub validator: Arc<OAuthValidator>,

    /// Served at `/.well-known/jwks.json`; derived from `signer` once at startup.
    pub published_jwks: Arc<Jwks>,

    pub exempt_paths: ExemptPaths,
}

impl AppState {
    pub fn new(config: Config, signer: TokenSigner, validator: Arc<OAuthValidator>) -> Self {
        let published_jwks = Arc::new(Jwks::from_signer(&signer));
        Self {
            config,
            signer: Arc::new(signer),
            validator,
            published_jwks,
            exempt_paths: ExemptPaths::default(),
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/.well-known/jwks.json` - This service's public keys (open)
/// - `/v1/health` - Health check (open)
/// - `/metrics` - Prometheus metrics (open)
/// - `/v1/me` - Claims of the caller (protected)
/// - everything in `api_routes`, classified by the exempt-path policy
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(
    state: Arc<AppState>,
    api_routes: Router,
    metrics_handle: PrometheusHandle,
) -> Router {
    let auth_state = Arc::new(AuthState::new(
        Arc::clone(&state.validator),
        state.exempt_paths.clone(),
    ));

    let service_routes = Router::new()
        .route("/.well-known/jwks.json", get(handlers::handle_get_jwks))
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/me", get(handlers::get_me))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. authenticate - Exempt-path policy and token validation (innermost)
    // 2. TimeoutLayer - Timeout the request
    // 3. TraceLayer - Log request details (outermost)
    service_routes
        .merge(metrics_routes)
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(auth_state, authenticate))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
