//! Observability for the auth service.
//!
//! Spans on the request path use `#[instrument(skip_all)]`; tokens, headers
//! and key material never appear as span fields or log values.

pub mod metrics;

pub use metrics::init_metrics_recorder;
