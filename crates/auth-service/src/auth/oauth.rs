//! OAuth bearer-token validator.
//!
//! Turns a request's token into verified `Claims` using the public keys in
//! the `PublicKeyCache`, and owns the background task that keeps that cache
//! fresh.
//!
//! # Security
//!
//! - Only RS256 is accepted. The header `alg` is checked before any key
//!   lookup, so a token declaring HS256 (or `none`) is never verified with an
//!   RSA public key used as an HMAC secret
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Expiry is checked by `Claims::valid()` with no leeway
//! - Error messages never echo the raw token

use crate::auth::cache::{HttpJwksSource, JwksSource, PublicKeyCache};
use crate::auth::claims::Claims;
use crate::auth::token::{BearerToken, TokenSource};
use crate::config::{
    Config, DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS, DEFAULT_JWKS_RETRY_SECONDS,
    DEFAULT_JWKS_VALIDITY_FREQUENCY_SECONDS,
};
use crate::errors::{AuthError, JwksFetchError};
use crate::observability::metrics::record_token_validation;
use crate::tasks::jwks_refresh::{refresh_once, run_jwks_refresh};
use axum::http::HeaderMap;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// The only algorithm this validator accepts.
pub const ACCEPTED_ALGORITHM: &str = "RS256";

/// Where and how often the validator loads public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthOptions {
    /// Remote JWKS endpoint.
    pub jwks_url: String,

    /// Delay before the next refresh after a successful one.
    pub validity_frequency: Duration,

    /// Delay before the next refresh after a failed one.
    pub retry_interval: Duration,

    pub fetch_timeout: Duration,
}

impl OAuthOptions {
    /// Options for `jwks_url` with the default 30-minute refresh, 3-second
    /// retry and 5-second fetch timeout.
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            validity_frequency: Duration::from_secs(DEFAULT_JWKS_VALIDITY_FREQUENCY_SECONDS),
            retry_interval: Duration::from_secs(DEFAULT_JWKS_RETRY_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            jwks_url: config.jwks_url.clone(),
            validity_frequency: config.jwks_validity_frequency,
            retry_interval: config.jwks_retry_interval,
            fetch_timeout: config.jwks_fetch_timeout,
        }
    }

    /// How long to wait after a refresh with this outcome.
    pub fn next_delay<T>(&self, outcome: &Result<T, JwksFetchError>) -> Duration {
        match outcome {
            Ok(_) => self.validity_frequency,
            Err(_) => self.retry_interval,
        }
    }
}

struct RefreshTask {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Validates bearer tokens against a periodically refreshed JWKS.
pub struct OAuthValidator {
    options: OAuthOptions,
    cache: Arc<PublicKeyCache>,
    source: Arc<dyn JwksSource>,
    token_source: TokenSource,
    refresh_task: Mutex<Option<RefreshTask>>,
}

impl OAuthValidator {
    /// Validator fetching keys over HTTP from `options.jwks_url`.
    ///
    /// # Errors
    ///
    /// `AuthError::Jwks` if the HTTP client cannot be built.
    pub fn new(options: OAuthOptions, token_source: TokenSource) -> Result<Self, AuthError> {
        let source = HttpJwksSource::new(options.jwks_url.clone(), options.fetch_timeout)?;
        Ok(Self::with_source(options, Arc::new(source), token_source))
    }

    /// Validator fetching keys from an arbitrary source.
    pub fn with_source(
        options: OAuthOptions,
        source: Arc<dyn JwksSource>,
        token_source: TokenSource,
    ) -> Self {
        Self {
            options,
            cache: Arc::new(PublicKeyCache::new()),
            source,
            token_source,
            refresh_task: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &OAuthOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<PublicKeyCache> {
        &self.cache
    }

    pub fn token_source(&self) -> TokenSource {
        self.token_source
    }

    /// Fetch keys immediately, then keep refreshing in the background until
    /// `stop()`.
    ///
    /// The initial outcome is returned for logging; a failed first fetch is
    /// retried by the background task like any other failure. Calling `start`
    /// on a running validator does nothing.
    pub async fn start(&self) -> Result<usize, JwksFetchError> {
        let mut refresh_task = self.refresh_task.lock().await;
        if refresh_task.is_some() {
            tracing::debug!(target: "auth.oauth", "JWKS refresh already running");
            return Ok(self.cache.key_count().await);
        }

        let initial = refresh_once(&self.cache, self.source.as_ref()).await;
        let first_delay = self.options.next_delay(&initial);

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run_jwks_refresh(
            Arc::clone(&self.cache),
            Arc::clone(&self.source),
            self.options.clone(),
            first_delay,
            cancel_token.clone(),
        ));

        tracing::info!(
            target: "auth.oauth",
            source = %self.source.describe(),
            next_refresh_seconds = first_delay.as_secs(),
            "JWKS refresh started"
        );

        *refresh_task = Some(RefreshTask {
            handle,
            cancel_token,
        });
        initial
    }

    /// Cancel the background refresh and wait for it to exit.
    pub async fn stop(&self) {
        let Some(task) = self.refresh_task.lock().await.take() else {
            return;
        };

        task.cancel_token.cancel();
        if let Err(e) = task.handle.await {
            tracing::warn!(target: "auth.oauth", error = %e, "JWKS refresh task ended abnormally");
        }
        tracing::info!(target: "auth.oauth", "JWKS refresh stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.refresh_task.lock().await.is_some()
    }

    /// Refresh out of schedule. The background cadence is unaffected.
    pub async fn refresh_now(&self) -> Result<usize, JwksFetchError> {
        refresh_once(&self.cache, self.source.as_ref()).await
    }

    /// Extract the token from request headers and validate it.
    #[instrument(skip_all)]
    pub async fn validate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let outcome = match self.token_source.extract(headers) {
            Ok(token) => self.verify(&token).await,
            Err(e) => Err(e),
        };
        record_outcome(&outcome);
        outcome
    }

    /// Validate a bare `header.payload.signature` token.
    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let outcome = match BearerToken::parse_compact(token) {
            Ok(token) => self.verify(&token).await,
            Err(e) => Err(e),
        };
        record_outcome(&outcome);
        outcome
    }

    async fn verify(&self, token: &BearerToken) -> Result<Claims, AuthError> {
        let header = token.header();

        // Pin the algorithm before touching key material
        if header.alg != ACCEPTED_ALGORITHM {
            return Err(AuthError::AlgorithmMismatch(format!(
                "expected {ACCEPTED_ALGORITHM}, got '{}'",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::InvalidToken("token header has no key id".to_string()))?;

        let snapshot = self.cache.snapshot().await;
        let jwk = snapshot
            .get(kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))?;

        if !jwk.is_rsa() {
            return Err(AuthError::UnusableKey(format!(
                "key type '{}' cannot verify {ACCEPTED_ALGORITHM}",
                jwk.kty
            )));
        }

        let public_key = jwk.rsa_public_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        // Expiry is enforced by Claims::valid() without leeway
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token.as_str(), public_key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("signature verification failed".to_string())
                }
                JwtErrorKind::InvalidAlgorithm => {
                    AuthError::AlgorithmMismatch(format!("expected {ACCEPTED_ALGORITHM}"))
                }
                JwtErrorKind::ImmatureSignature => {
                    AuthError::InvalidToken("token not yet valid".to_string())
                }
                _ => AuthError::InvalidToken(format!("cannot decode token: {e}")),
            })?
            .claims;

        claims.valid()?;
        Ok(claims)
    }
}

fn record_outcome(outcome: &Result<Claims, AuthError>) {
    match outcome {
        Ok(_) => {
            tracing::debug!(target: "auth.oauth", "Token validated successfully");
            record_token_validation("success", None);
        }
        Err(e) => {
            tracing::debug!(target: "auth.oauth", error = %e, "Token validation failed");
            record_token_validation("error", Some(e.label()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::cache::scripted::ScriptedJwksSource;
    use crate::auth::jwks::Jwks;
    use auth_test_utils::{jwks_json, MockJwksServer, TestClaimsBuilder, TestRsaKey};
    use axum::http::header::AUTHORIZATION;
    use axum::http::HeaderValue;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn jwks_of(keys: &[&TestRsaKey]) -> Jwks {
        serde_json::from_value(jwks_json(keys)).unwrap()
    }

    async fn validator_with(keys: &[&TestRsaKey]) -> OAuthValidator {
        let validator = OAuthValidator::with_source(
            OAuthOptions::new("http://unused"),
            Arc::new(ScriptedJwksSource::new(vec![])),
            TokenSource::Header,
        );
        validator.cache().replace(jwks_of(keys)).await;
        validator
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_options_defaults() {
        let options = OAuthOptions::new("http://keys");
        assert_eq!(options.validity_frequency, Duration::from_secs(1800));
        assert_eq!(options.retry_interval, Duration::from_secs(3));
        assert_eq!(options.fetch_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_next_delay_depends_on_outcome() {
        let options = OAuthOptions::new("http://keys");
        assert_eq!(options.next_delay(&Ok::<usize, _>(1)), Duration::from_secs(1800));
        assert_eq!(
            options.next_delay(&Err::<usize, _>(JwksFetchError::Status(500))),
            Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn test_validate_accepts_valid_token() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let token = key.sign(&TestClaimsBuilder::new().user_id(31).build());

        let claims = validator.validate(&bearer_headers(&token)).await.unwrap();
        assert_eq!(claims.user_id, 31);
    }

    #[tokio::test]
    async fn test_validate_token_accepts_bare_string() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let token = key.sign(&TestClaimsBuilder::new().build());

        assert!(validator.validate_token(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_header() {
        let validator = validator_with(&[&TestRsaKey::primary()]).await;
        let err = validator.validate(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken(_)));
    }

    #[tokio::test]
    async fn test_bearer_abc_is_malformed() {
        let validator = validator_with(&[&TestRsaKey::primary()]).await;
        let err = validator.validate(&bearer_headers("abc")).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("not in the format [header.payload.signature]"));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let token = key.sign(
            &TestClaimsBuilder::new()
                .expired_by(chrono::Duration::seconds(1))
                .build(),
        );

        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");
    }

    #[tokio::test]
    async fn test_explicit_future_expiry_accepted() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let exp = chrono::Utc::now().timestamp() + 60;
        let token = key.sign(&TestClaimsBuilder::new().expires_at(exp).build());

        let claims = validator.validate_token(&token).await.unwrap();
        assert_eq!(claims.exp, exp);
    }

    #[tokio::test]
    async fn test_zero_user_id_rejected() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let token = key.sign(&TestClaimsBuilder::new().user_id(0).build());

        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingUserId));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_key_not_found() {
        let validator = validator_with(&[&TestRsaKey::primary()]).await;
        let token = TestRsaKey::secondary().sign(&TestClaimsBuilder::new().build());

        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound(ref kid) if kid == "test-key-02"));
    }

    #[tokio::test]
    async fn test_empty_cache_is_key_not_found() {
        let validator = validator_with(&[]).await;
        let token = TestRsaKey::primary().sign(&TestClaimsBuilder::new().build());

        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_kid_rejected() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let token = key.sign_with_header(
            &Header::new(Algorithm::RS256),
            &TestClaimsBuilder::new().build(),
        );

        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_signature_from_other_key_rejected() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        // Advertise the secondary's kid with the primary's material
        let body = serde_json::json!({ "keys": [primary.jwk_json_with_kid("test-key-02")] });
        let validator = validator_with(&[]).await;
        validator
            .cache()
            .replace(serde_json::from_value(body).unwrap())
            .await;

        let token = secondary.sign(&TestClaimsBuilder::new().build());
        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_hs256_token_rejected_even_when_keyed_with_public_key() {
        // Algorithm confusion: HMAC keyed with the RSA modulus bytes
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(key.kid().to_string());
        let secret = URL_SAFE_NO_PAD.decode(key.modulus_b64()).unwrap();
        let token = encode(
            &header,
            &TestClaimsBuilder::new().build(),
            &EncodingKey::from_secret(&secret),
        )
        .unwrap();

        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::AlgorithmMismatch(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_alg_none_rejected() {
        let validator = validator_with(&[&TestRsaKey::primary()]).await;
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","kid":"test-key-01"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":1,"exp":9999999999}"#);

        let err = validator
            .validate_token(&format!("{header}.{payload}.sig"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlgorithmMismatch(_)));
    }

    #[tokio::test]
    async fn test_non_rsa_key_unusable() {
        let key = TestRsaKey::primary();
        let mut jwk = key.jwk_json();
        jwk["kty"] = serde_json::json!("OKP");
        let validator = validator_with(&[]).await;
        validator
            .cache()
            .replace(serde_json::from_value(serde_json::json!({ "keys": [jwk] })).unwrap())
            .await;

        let token = key.sign(&TestClaimsBuilder::new().build());
        let err = validator.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnusableKey(_)));
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let key = TestRsaKey::primary();
        let validator = validator_with(&[&key]).await;
        let token = key.sign(&TestClaimsBuilder::new().user_id(1).build());

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = TestClaimsBuilder::new().user_id(2).build();
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());

        let err = validator.validate_token(&parts.join(".")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_cookie_source() {
        let key = TestRsaKey::primary();
        let validator = OAuthValidator::with_source(
            OAuthOptions::new("http://unused"),
            Arc::new(ScriptedJwksSource::new(vec![])),
            TokenSource::Cookie,
        );
        validator.cache().replace(jwks_of(&[&key])).await;

        let token = key.sign(&TestClaimsBuilder::new().build());
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("auth-token={token}")).unwrap(),
        );

        assert!(validator.validate(&headers).await.is_ok());
        // A bearer header is ignored in cookie mode
        let err = validator.validate(&bearer_headers(&token)).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken("cookie")));
    }

    #[tokio::test]
    async fn test_concurrent_validation_during_rotation() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        let validator = Arc::new(validator_with(&[&primary]).await);
        let old_token = primary.sign(&TestClaimsBuilder::new().build());
        let new_token = secondary.sign(&TestClaimsBuilder::new().build());

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let validator = Arc::clone(&validator);
            let old_token = old_token.clone();
            let new_token = new_token.clone();
            tasks.push(tokio::spawn(async move {
                let old = validator.validate_token(&old_token).await;
                let new = validator.validate_token(&new_token).await;
                (old.is_ok(), new.is_ok())
            }));
        }

        validator.cache().replace(jwks_of(&[&secondary])).await;

        // The old token is checked first, so if it already saw the new set
        // the new token must too. Failing both would mean a torn snapshot.
        for task in tasks {
            let (old_ok, new_ok) = task.await.unwrap();
            assert!(old_ok || new_ok);
        }

        assert!(validator.validate_token(&old_token).await.is_err());
        assert!(validator.validate_token(&new_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_is_whole_during_swap() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        let validator = Arc::new(validator_with(&[&primary]).await);

        let reader = {
            let validator = Arc::clone(&validator);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let snapshot = validator.cache().snapshot().await;
                    let has_primary = snapshot.get("test-key-01").is_some();
                    let has_secondary = snapshot.get("test-key-02").is_some();
                    // Old set: primary only. New set: secondary only.
                    assert!(has_primary != has_secondary);
                    tokio::task::yield_now().await;
                }
            })
        };

        for i in 0..50 {
            let keys = if i % 2 == 0 { &secondary } else { &primary };
            validator.cache().replace(jwks_of(&[keys])).await;
            tokio::task::yield_now().await;
        }

        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_start_fetches_immediately_and_stop_cancels() {
        let key = TestRsaKey::primary();
        let server = MockJwksServer::with_keys(&[&key]).await;
        let validator =
            OAuthValidator::new(OAuthOptions::new(server.jwks_url()), TokenSource::Header)
                .unwrap();

        assert_eq!(validator.start().await.unwrap(), 1);
        assert!(validator.is_running().await);
        assert_eq!(server.request_count().await, 1);

        // Second start is a no-op
        assert_eq!(validator.start().await.unwrap(), 1);
        assert_eq!(server.request_count().await, 1);

        let token = key.sign(&TestClaimsBuilder::new().build());
        assert!(validator.validate_token(&token).await.is_ok());

        validator.stop().await;
        assert!(!validator.is_running().await);
    }

    #[tokio::test]
    async fn test_start_with_unreachable_endpoint_keeps_running() {
        let server = MockJwksServer::start().await;
        server.serve_status(500).await;
        let validator =
            OAuthValidator::new(OAuthOptions::new(server.jwks_url()), TokenSource::Header)
                .unwrap();

        let initial = validator.start().await;
        assert_eq!(initial, Err(JwksFetchError::Status(500)));
        assert!(validator.is_running().await);

        validator.stop().await;
    }

    #[tokio::test]
    async fn test_refresh_now_picks_up_rotation() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        let source = Arc::new(ScriptedJwksSource::new(vec![Ok(jwks_of(&[&secondary]))]));
        let validator = OAuthValidator::with_source(
            OAuthOptions::new("http://unused"),
            source.clone(),
            TokenSource::Header,
        );
        validator.cache().replace(jwks_of(&[&primary])).await;

        assert_eq!(validator.refresh_now().await.unwrap(), 1);
        assert_eq!(source.fetch_count(), 1);

        let token = secondary.sign(&TestClaimsBuilder::new().build());
        assert!(validator.validate_token(&token).await.is_ok());
    }
}
