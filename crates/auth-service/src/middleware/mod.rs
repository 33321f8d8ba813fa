//! HTTP middleware for the auth service.
//!
//! # Components
//!
//! - `auth` - Token validation applied per the exempt-path policy
//! - `exempt_paths` - Path classification (open, login, protected)

pub mod auth;
pub mod exempt_paths;

pub use auth::{authenticate, AuthState, ClaimsExt};
pub use exempt_paths::{ExemptPaths, PathClass};
