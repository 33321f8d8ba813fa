//! Auth service error types.
//!
//! Every failure in the authentication path is one `AuthError` variant. The
//! variant decides the HTTP status, the `type` string in the response body, and
//! the coarse `ErrorKind` used for logging and metrics. Messages never contain
//! the raw token or header value.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an `AuthError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller's credentials are missing, malformed or not acceptable.
    Auth,
    /// Something this service depends on failed (JWKS endpoint, signing key).
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

/// Failure while loading a JWKS document from the remote endpoint.
///
/// The variants are kept distinct for logs and metrics; the refresh loop
/// treats all of them the same way (fast retry, keep the previous snapshot).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwksFetchError {
    #[error("failed to build JWKS http client: {0}")]
    Client(String),

    #[error("failed to fetch the response from jwks endpoint: {0}")]
    Request(String),

    #[error("jwks endpoint returned status {0}")]
    Status(u16),

    #[error("error in reading response from jwks endpoint: {0}")]
    BodyRead(String),

    #[error("error in unmarshalling response from jwks endpoint: {0}")]
    Parse(String),
}

impl JwksFetchError {
    /// Bounded label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            JwksFetchError::Client(_) => "client",
            JwksFetchError::Request(_) => "request",
            JwksFetchError::Status(_) => "status",
            JwksFetchError::BodyRead(_) => "body_read",
            JwksFetchError::Parse(_) => "parse",
        }
    }
}

/// Auth service error type.
///
/// Maps to HTTP status codes:
/// - MalformedHeader: 400 Bad Request
/// - MissingToken, InvalidToken, TokenExpired, MissingUserId,
///   AlgorithmMismatch, KeyNotFound, UnusableKey: 401 Unauthorized
/// - AlreadyAuthenticated: 403 Forbidden
/// - Jwks, Signing: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    MalformedHeader(String),

    #[error("cannot fetch auth-token; {0} missing")]
    MissingToken(&'static str),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired. log in again")]
    TokenExpired,

    #[error("user id not present in claims")]
    MissingUserId,

    #[error("invalid signing algorithm: {0}")]
    AlgorithmMismatch(String),

    #[error("no public key found for key id '{0}'")]
    KeyNotFound(String),

    #[error("public key unusable: {0}")]
    UnusableKey(String),

    #[error("logout before logging in")]
    AlreadyAuthenticated,

    #[error(transparent)]
    Jwks(#[from] JwksFetchError),

    #[error("error in signing token: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MalformedHeader(_)
            | AuthError::MissingToken(_)
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::MissingUserId
            | AuthError::AlgorithmMismatch(_)
            | AuthError::KeyNotFound(_)
            | AuthError::UnusableKey(_)
            | AuthError::AlreadyAuthenticated => ErrorKind::Auth,
            AuthError::Jwks(_) | AuthError::Signing(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedHeader(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingToken(_)
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::MissingUserId
            | AuthError::AlgorithmMismatch(_)
            | AuthError::KeyNotFound(_)
            | AuthError::UnusableKey(_) => StatusCode::UNAUTHORIZED,
            AuthError::AlreadyAuthenticated => StatusCode::FORBIDDEN,
            AuthError::Jwks(_) | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Bounded label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AuthError::MalformedHeader(_) => "malformed_header",
            AuthError::MissingToken(_) => "missing_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::MissingUserId => "missing_user_id",
            AuthError::AlgorithmMismatch(_) => "algorithm_mismatch",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::UnusableKey(_) => "unusable_key",
            AuthError::AlreadyAuthenticated => "already_authenticated",
            AuthError::Jwks(_) => "jwks",
            AuthError::Signing(_) => "signing",
        }
    }

    /// Value of the `type` field in the JSON error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::AlreadyAuthenticated => "login-error",
            AuthError::Jwks(_) => "jwks-error",
            AuthError::Signing(_) => "token-creation",
            _ => "auth-error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    msg: String,
    #[serde(rename = "type")]
    error_type: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let msg = match &self {
            AuthError::Jwks(err) => {
                tracing::error!(target: "auth.errors", error = %err, "JWKS failure surfaced to a request");
                "authentication keys unavailable".to_string()
            }
            AuthError::Signing(err) => {
                tracing::error!(target: "auth.errors", error = %err, "Token signing failed");
                "error in signing token".to_string()
            }
            AuthError::MalformedHeader(_)
            | AuthError::MissingToken(_)
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::MissingUserId
            | AuthError::AlgorithmMismatch(_)
            | AuthError::KeyNotFound(_)
            | AuthError::UnusableKey(_)
            | AuthError::AlreadyAuthenticated => self.to_string(),
        };

        let body = ErrorResponse {
            status: "failure",
            error: ErrorDetail {
                msg,
                error_type: self.error_type(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"picshot\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
