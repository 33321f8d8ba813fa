//! Auth Service Library
//!
//! Bearer-token authentication for the Picshot HTTP API:
//!
//! - Token issuance (RS256 with a published JWKS, or HS512)
//! - Bearer header parsing and JWT header decoding
//! - RSA public key reconstruction from JWK `n`/`e`
//! - A JWKS cache refreshed in the background from a remote endpoint
//! - RS256-pinned token validation
//! - An exempt-path policy applied as axum middleware
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/oauth.rs -> auth/{token,cache,jwks,jwk,claims}.rs
//!                                          \-> tasks/jwks_refresh.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Claims, token codec, keys, cache, validator and signer
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication middleware and exempt-path policy
//! - `observability` - Metrics
//! - `routes` - Axum router setup
//! - `tasks` - Background JWKS refresh

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;
