//! Current user handler.
//!
//! Returns the verified claims of the caller. Lives behind the auth
//! middleware, which is what puts `Claims` in the request extensions.

use crate::auth::Claims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user_id: i64,

    /// Token expiration timestamp.
    pub exp: i64,

    /// Token issued-at timestamp.
    pub iat: i64,
}

/// Handler for GET /v1/me
///
/// ```json
/// { "user_id": 42, "exp": 1234567890, "iat": 1234567800 }
/// ```
#[instrument(skip_all, name = "auth.handlers.me")]
pub async fn get_me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    tracing::debug!(target: "auth.handlers.me", "Returning user claims");

    Json(MeResponse {
        user_id: claims.user_id,
        exp: claims.exp,
        iat: claims.iat,
    })
}
