//! Background tasks for the auth service.
//!
//! # Tasks
//!
//! - `jwks_refresh` - Keeps the public key cache in step with the remote JWKS

pub mod jwks_refresh;

pub use jwks_refresh::{refresh_once, run_jwks_refresh};
