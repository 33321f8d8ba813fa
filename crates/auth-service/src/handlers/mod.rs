//! HTTP request handlers for the auth service.

pub mod health;
pub mod jwks;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use jwks::handle_get_jwks;
pub use me::get_me;
pub use metrics::metrics_handler;
