use crate::auth::Jwks;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handle JWKS request
///
/// GET /.well-known/jwks.json
///
/// Returns this service's own public signing key(s) in JWKS format (RFC 7517)
/// with Cache-Control header set to max-age=3600 (1 hour). Empty in HMAC
/// signing mode.
#[instrument(skip_all, name = "auth.jwks.get")]
pub async fn handle_get_jwks(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<Jwks>) {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));

    (headers, Json(state.published_jwks.as_ref().clone()))
}
