//! Bearer-token authentication.
//!
//! # Components
//!
//! - `claims` - Token payload and its validity rule
//! - `token` - Bearer header parsing and JWT header decoding
//! - `jwk` / `jwks` - Public keys and RSA reconstruction from `n`/`e`
//! - `cache` - Swappable JWKS snapshot and the sources that fill it
//! - `oauth` - RS256-pinned validator owning the refresh task
//! - `signer` - Token issuance

pub mod cache;
pub mod claims;
pub mod jwk;
pub mod jwks;
pub mod oauth;
pub mod signer;
pub mod token;

pub use cache::{HttpJwksSource, JwksSource, PublicKeyCache};
pub use claims::Claims;
pub use jwk::{Jwk, RsaVerifyingKey};
pub use jwks::Jwks;
pub use oauth::{OAuthOptions, OAuthValidator};
pub use signer::TokenSigner;
pub use token::{BearerToken, JwtHeader, TokenSource};
