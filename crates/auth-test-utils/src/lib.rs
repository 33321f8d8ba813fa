//! # Auth Test Utilities
//!
//! Shared test utilities for the auth service.
//!
//! This crate provides:
//! - Deterministic RSA fixtures (`TestRsaKey`) for signing tokens and building JWKs
//! - Claim builders (`TestClaimsBuilder`) for valid and invalid payloads
//! - A mock remote JWKS endpoint (`MockJwksServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestRsaKey::primary();
//!     let jwks = MockJwksServer::with_keys(&[&key]).await;
//!     let token = key.sign(&TestClaimsBuilder::new().build());
//!     // point the validator at jwks.jwks_url() and validate `token`
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
