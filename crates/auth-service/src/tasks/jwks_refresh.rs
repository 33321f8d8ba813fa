//! JWKS refresh background task.
//!
//! Reloads the public key cache from a `JwksSource` for the life of the
//! process. After a successful fetch the next one is scheduled after the
//! validity frequency (default 30 minutes); after a failure, after the short
//! retry interval (default 3 seconds). Each fetch is scheduled only once the
//! previous one has finished, so fetches never overlap.
//!
//! # Graceful Shutdown
//!
//! The task exits as soon as its cancellation token fires, including while a
//! fetch is in flight. The cache keeps whatever snapshot it last held.

use crate::auth::cache::{JwksSource, PublicKeyCache};
use crate::auth::oauth::OAuthOptions;
use crate::errors::JwksFetchError;
use crate::observability::metrics::{record_jwks_refresh, set_jwks_keys};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Fetch once and, on success, replace the cache snapshot.
///
/// A failed fetch leaves the current snapshot untouched. The write lock is
/// taken only for the swap, never across the fetch.
pub async fn refresh_once(
    cache: &PublicKeyCache,
    source: &dyn JwksSource,
) -> Result<usize, JwksFetchError> {
    let start = Instant::now();

    match source.fetch().await {
        Ok(jwks) => {
            let key_count = cache.replace(jwks).await;
            record_jwks_refresh("success", None, start.elapsed());
            set_jwks_keys(key_count);
            info!(
                target: "auth.jwks",
                key_count,
                "JWKS cache refreshed"
            );
            Ok(key_count)
        }
        Err(e) => {
            record_jwks_refresh("error", Some(e.label()), start.elapsed());
            warn!(
                target: "auth.jwks",
                error = %e,
                source = %source.describe(),
                "JWKS refresh failed, keeping previous keys"
            );
            Err(e)
        }
    }
}

/// Run the refresh loop until `cancel_token` fires.
///
/// The first refresh happens after `first_delay`; `OAuthValidator::start`
/// performs the immediate fetch itself and passes the delay its outcome
/// calls for.
#[instrument(skip_all, name = "auth.task.jwks_refresh")]
pub async fn run_jwks_refresh(
    cache: Arc<PublicKeyCache>,
    source: Arc<dyn JwksSource>,
    options: OAuthOptions,
    first_delay: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "auth.task.jwks_refresh",
        validity_frequency_seconds = options.validity_frequency.as_secs(),
        retry_seconds = options.retry_interval.as_secs(),
        "Starting JWKS refresh task"
    );

    let mut delay = first_delay;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => break,
        }

        let outcome = tokio::select! {
            outcome = refresh_once(&cache, source.as_ref()) => outcome,
            _ = cancel_token.cancelled() => break,
        };

        delay = options.next_delay(&outcome);
        tracing::debug!(
            target: "auth.task.jwks_refresh",
            next_refresh_seconds = delay.as_secs(),
            "Next JWKS refresh scheduled"
        );
    }

    info!(
        target: "auth.task.jwks_refresh",
        "JWKS refresh task received shutdown signal, exiting"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::cache::scripted::ScriptedJwksSource;
    use crate::auth::jwks::Jwks;
    use auth_test_utils::{jwks_json, TestRsaKey};

    fn jwks_of(keys: &[&TestRsaKey]) -> Jwks {
        serde_json::from_value(jwks_json(keys)).unwrap()
    }

    fn options() -> OAuthOptions {
        OAuthOptions::new("http://unused")
    }

    async fn wait_for_fetches(source: &ScriptedJwksSource, count: usize) {
        while source.fetch_count() < count {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test]
    async fn test_refresh_once_replaces_snapshot() {
        let cache = PublicKeyCache::with_jwks(jwks_of(&[&TestRsaKey::primary()]));
        let source = ScriptedJwksSource::new(vec![Ok(jwks_of(&[&TestRsaKey::secondary()]))]);

        assert_eq!(refresh_once(&cache, &source).await.unwrap(), 1);

        let snapshot = cache.snapshot().await;
        assert!(snapshot.get("test-key-01").is_none());
        assert!(snapshot.get("test-key-02").is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_keys() {
        let cache = PublicKeyCache::with_jwks(jwks_of(&[&TestRsaKey::primary()]));
        let source = ScriptedJwksSource::new(vec![Err(JwksFetchError::Status(500))]);

        let err = refresh_once(&cache, &source).await.unwrap_err();

        assert_eq!(err, JwksFetchError::Status(500));
        assert!(cache.snapshot().await.get("test-key-01").is_some());
    }

    #[tokio::test]
    async fn test_every_error_kind_keeps_previous_keys() {
        let cache = PublicKeyCache::with_jwks(jwks_of(&[&TestRsaKey::primary()]));
        let source = ScriptedJwksSource::new(vec![
            Err(JwksFetchError::Request("refused".to_string())),
            Err(JwksFetchError::BodyRead("reset".to_string())),
            Err(JwksFetchError::Parse("eof".to_string())),
        ]);

        for _ in 0..3 {
            assert!(refresh_once(&cache, &source).await.is_err());
        }
        assert_eq!(cache.key_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retries_fast_then_success_waits_validity_frequency() {
        let cache = Arc::new(PublicKeyCache::new());
        let source = Arc::new(ScriptedJwksSource::new(vec![
            Err(JwksFetchError::Status(500)),
            Ok(jwks_of(&[&TestRsaKey::primary()])),
            Ok(jwks_of(&[&TestRsaKey::secondary()])),
        ]));
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_jwks_refresh(
            Arc::clone(&cache),
            source.clone(),
            options(),
            Duration::ZERO,
            cancel_token.clone(),
        ));

        wait_for_fetches(&source, 3).await;
        cancel_token.cancel();
        handle.await.unwrap();

        let times = source.fetch_times();
        assert_eq!(times[1] - times[0], Duration::from_secs(3));
        assert_eq!(times[2] - times[1], Duration::from_secs(1800));
        assert!(cache.snapshot().await.get("test-key-02").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_delay_is_honoured() {
        let cache = Arc::new(PublicKeyCache::new());
        let source = Arc::new(ScriptedJwksSource::new(vec![]));
        let cancel_token = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let handle = tokio::spawn(run_jwks_refresh(
            cache,
            source.clone(),
            options(),
            Duration::from_secs(1800),
            cancel_token.clone(),
        ));

        wait_for_fetches(&source, 1).await;
        cancel_token.cancel();
        handle.await.unwrap();

        assert_eq!(source.fetch_times()[0] - started, Duration::from_secs(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_never_overlaps_next_attempt() {
        let cache = Arc::new(PublicKeyCache::new());
        // Each fetch takes 10s and fails, so retries are 3s after completion
        let source = Arc::new(
            ScriptedJwksSource::new(vec![]).with_delay(Duration::from_secs(10)),
        );
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_jwks_refresh(
            cache,
            source.clone(),
            options(),
            Duration::ZERO,
            cancel_token.clone(),
        ));

        wait_for_fetches(&source, 3).await;
        cancel_token.cancel();
        handle.await.unwrap();

        let times = source.fetch_times();
        assert_eq!(times[1] - times[0], Duration::from_secs(13));
        assert_eq!(times[2] - times[1], Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_loop() {
        let source = Arc::new(ScriptedJwksSource::new(vec![]));
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_jwks_refresh(
            Arc::new(PublicKeyCache::new()),
            source.clone(),
            options(),
            Duration::ZERO,
            cancel_token.clone(),
        ));

        wait_for_fetches(&source, 2).await;
        cancel_token.cancel();
        handle.await.unwrap();

        let fetches = source.fetch_count();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetch_count(), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_in_flight_fetch() {
        let cache = Arc::new(PublicKeyCache::with_jwks(jwks_of(&[&TestRsaKey::primary()])));
        let source = Arc::new(
            ScriptedJwksSource::new(vec![Ok(Jwks::default())]).with_delay(Duration::from_secs(300)),
        );
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_jwks_refresh(
            Arc::clone(&cache),
            source.clone(),
            options(),
            Duration::ZERO,
            cancel_token.clone(),
        ));

        wait_for_fetches(&source, 1).await;
        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should exit promptly")
            .unwrap();

        // The abandoned fetch never swapped in its (empty) set
        assert_eq!(cache.key_count().await, 1);
    }
}
