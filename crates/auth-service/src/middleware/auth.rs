//! Authentication middleware.
//!
//! Classifies each request path with `ExemptPaths`, validates the token where
//! the class calls for it, and injects the verified `Claims` into request
//! extensions for protected routes.

use crate::auth::{Claims, OAuthValidator};
use crate::errors::AuthError;
use crate::middleware::exempt_paths::{ExemptPaths, PathClass};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<OAuthValidator>,
    pub exempt_paths: Arc<ExemptPaths>,
}

impl AuthState {
    pub fn new(validator: Arc<OAuthValidator>, exempt_paths: ExemptPaths) -> Self {
        Self {
            validator,
            exempt_paths: Arc::new(exempt_paths),
        }
    }
}

/// Apply the exempt-path policy to one request.
///
/// # Response
///
/// - Open paths: passed through untouched
/// - Login paths: 403 "logout before logging in" if the request carries a
///   valid token, otherwise passed through unauthenticated
/// - Everything else: 400/401 on a missing, malformed or invalid token;
///   otherwise passed through with `Claims` in extensions
#[instrument(skip_all, name = "auth.middleware", fields(path_class))]
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path_class = state.exempt_paths.classify(req.uri().path());
    tracing::Span::current().record("path_class", tracing::field::debug(path_class));

    match path_class {
        PathClass::Open => Ok(next.run(req).await),
        PathClass::Login => match state.validator.validate(req.headers()).await {
            Ok(_) => {
                tracing::debug!(target: "auth.middleware", "Valid token presented on login path");
                Err(AuthError::AlreadyAuthenticated)
            }
            Err(e) => {
                tracing::debug!(
                    target: "auth.middleware",
                    reason = e.label(),
                    "Login path proceeding unauthenticated"
                );
                Ok(next.run(req).await)
            }
        },
        PathClass::Protected => {
            let claims = state.validator.validate(req.headers()).await?;
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
    }
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if the request did not pass through `authenticate` on a
    /// protected path.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
