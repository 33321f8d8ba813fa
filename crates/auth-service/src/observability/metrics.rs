//! Metrics definitions for the auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `error_type`: bounded by `JwksFetchError` / `AuthError` variants

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Fetches are bounded by the 5s default timeout
        .set_buckets_for_metric(
            Matcher::Prefix("auth_jwks_refresh".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record the outcome of one JWKS refresh.
///
/// Metrics: `auth_jwks_refresh_total`, `auth_jwks_refresh_duration_seconds`
/// Labels: `status`, `error_type`
pub fn record_jwks_refresh(status: &str, error_type: Option<&str>, duration: Duration) {
    let error_type = error_type.unwrap_or("none");
    counter!("auth_jwks_refresh_total", "status" => status.to_string(), "error_type" => error_type.to_string())
        .increment(1);

    histogram!("auth_jwks_refresh_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
}

/// Number of keys in the current snapshot.
///
/// Metric: `auth_jwks_keys`
pub fn set_jwks_keys(count: usize) {
    gauge!("auth_jwks_keys").set(count as f64);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record a token validation result.
///
/// Metric: `auth_token_validations_total`
/// Labels: `status`, `error_type`
pub fn record_token_validation(status: &str, error_type: Option<&str>) {
    let error_type = error_type.unwrap_or("none");
    counter!("auth_token_validations_total", "status" => status.to_string(), "error_type" => error_type.to_string())
        .increment(1);
}

/// Record a token issuance result.
///
/// Metric: `auth_tokens_issued_total`
/// Labels: `status`
pub fn record_token_issued(status: &str) {
    counter!("auth_tokens_issued_total", "status" => status.to_string()).increment(1);
}
