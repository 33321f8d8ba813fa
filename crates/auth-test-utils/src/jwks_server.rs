//! Mock remote JWKS endpoint
//!
//! Wraps a `wiremock::MockServer` serving `/.well-known/jwks.json`. The
//! response can be swapped mid-test to simulate key rotation and outages.

use crate::crypto_fixtures::{jwks_json, TestRsaKey};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock JWKS server for tests.
///
/// # Example
/// ```rust,ignore
/// let server = MockJwksServer::start().await;
/// server.serve_keys(&[&TestRsaKey::primary()]).await;
/// let url = server.jwks_url();
/// ```
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server with no mounted responses (every request 404s).
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start a server already serving the given keys.
    pub async fn with_keys(keys: &[&TestRsaKey]) -> Self {
        let server = Self::start().await;
        server.serve_keys(keys).await;
        server
    }

    /// Full URL of the JWKS document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace the current response with a 200 carrying the given keys.
    pub async fn serve_keys(&self, keys: &[&TestRsaKey]) {
        self.serve_json(jwks_json(keys)).await;
    }

    /// Replace the current response with a 200 carrying arbitrary JSON.
    pub async fn serve_json(&self, body: serde_json::Value) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Replace the current response with a raw 200 body (e.g. invalid JSON).
    pub async fn serve_raw(&self, body: &str) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(&self.server)
            .await;
    }

    /// Replace the current response with an error status.
    pub async fn serve_status(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Respond with the given keys only after `delay`.
    pub async fn serve_keys_delayed(&self, keys: &[&TestRsaKey], delay: std::time::Duration) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_json(keys))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Number of requests received since the last reset.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}
