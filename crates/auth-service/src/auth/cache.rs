//! Public key cache and JWKS sources.
//!
//! The cache holds one immutable `Jwks` snapshot behind an `Arc`. Readers
//! clone the `Arc` and work on it without holding the lock, so a refresh that
//! swaps in a new snapshot never blocks or tears an in-flight verification.
//!
//! # Security
//!
//! - A failed fetch never touches the current snapshot
//! - HTTPS should be used in production (enforced by deployment config)

use crate::auth::jwks::Jwks;
use crate::errors::JwksFetchError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::instrument;

/// Shared, atomically swappable JWKS snapshot.
#[derive(Debug, Default)]
pub struct PublicKeyCache {
    snapshot: RwLock<Arc<Jwks>>,
}

impl PublicKeyCache {
    /// Empty cache. Every lookup misses until the first successful refresh.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jwks(jwks: Jwks) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(jwks)),
        }
    }

    /// The current snapshot. Stays valid after later replacements.
    pub async fn snapshot(&self) -> Arc<Jwks> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Swap in a new snapshot and return its key count.
    pub async fn replace(&self, jwks: Jwks) -> usize {
        let count = jwks.len();
        *self.snapshot.write().await = Arc::new(jwks);
        count
    }

    pub async fn key_count(&self) -> usize {
        self.snapshot.read().await.len()
    }
}

/// Where fresh key sets come from.
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Fetch and parse one complete key set.
    async fn fetch(&self) -> Result<Jwks, JwksFetchError>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Loads a JWKS document over HTTP.
pub struct HttpJwksSource {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpJwksSource {
    /// Create a source for `jwks_url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// `JwksFetchError::Client` if the HTTP client cannot be built.
    pub fn new(jwks_url: impl Into<String>, timeout: Duration) -> Result<Self, JwksFetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JwksFetchError::Client(e.to_string()))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            http_client,
        })
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl JwksSource for HttpJwksSource {
    #[instrument(skip_all, fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<Jwks, JwksFetchError> {
        tracing::debug!(target: "auth.jwks", "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| JwksFetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(JwksFetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksFetchError::BodyRead(e.to_string()))?;

        serde_json::from_slice::<Jwks>(&body).map_err(|e| JwksFetchError::Parse(e.to_string()))
    }

    fn describe(&self) -> String {
        self.jwks_url.clone()
    }
}
