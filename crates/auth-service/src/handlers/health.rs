//! Health check handler.
//!
//! `/v1/health` reports liveness plus whether any verification keys are
//! loaded. It always answers 200 so the process is not restarted while the
//! JWKS endpoint is briefly unreachable.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" with keys loaded, "degraded" without.
    pub status: &'static str,

    /// Keys in the current verification snapshot.
    pub jwks_keys: usize,
}

/// Handler for GET /v1/health
#[tracing::instrument(skip_all, name = "auth.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let jwks_keys = state.validator.cache().key_count().await;
    let status = if jwks_keys > 0 { "healthy" } else { "degraded" };

    Json(HealthResponse { status, jwks_keys })
}
