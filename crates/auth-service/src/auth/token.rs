//! Bearer token extraction and JWT header decoding.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (DoS prevention)
//! - Only the header segment is decoded here; the signature is verified later
//!   against the key named by `kid`
//! - Error messages name the offending header but never echo its value

use crate::errors::AuthError;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical tokens issued by this service are well under 1KB. Anything larger
/// is rejected before base64 decoding or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Cookie carrying the token in cookie deployments.
pub const AUTH_COOKIE_NAME: &str = "auth-token";

/// Decoded JOSE header of an incoming token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JwtHeader {
    /// Signing algorithm declared by the token.
    #[serde(default)]
    pub alg: String,

    #[serde(default)]
    pub typ: Option<String>,

    /// JWK Set URL. Carried for completeness; never dereferenced.
    #[serde(default)]
    pub jku: Option<String>,

    /// Key ID used to select the verification key.
    #[serde(default)]
    pub kid: Option<String>,
}

/// A structurally valid compact JWT with its decoded header.
///
/// Keeps the original encoded string for signature verification once the
/// key is known. The token is redacted in Debug output.
#[derive(Clone)]
pub struct BearerToken {
    header: JwtHeader,
    token: String,
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("header", &self.header)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl BearerToken {
    /// Parse an `Authorization` header value of the form `Bearer <jwt>`.
    ///
    /// The value must split into exactly two whitespace-separated fields, the
    /// first equal to `bearer` ignoring case.
    ///
    /// # Errors
    ///
    /// `AuthError::MalformedHeader` for a bad scheme or field count, plus
    /// everything `parse_compact` returns.
    pub fn from_authorization(value: &str) -> Result<Self, AuthError> {
        let mut fields = value.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
                Self::parse_compact(token)
            }
            _ => Err(AuthError::MalformedHeader(
                "invalid auth-header: expected 'Bearer <token>'".to_string(),
            )),
        }
    }

    /// Parse a bare `header.payload.signature` string.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the token exceeds `MAX_JWT_SIZE_BYTES`
    /// - `AuthError::MalformedHeader` if it is not three non-empty segments,
    ///   or the header segment is not base64url JSON
    pub fn parse_compact(token: &str) -> Result<Self, AuthError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "auth.token",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum"
            );
            return Err(AuthError::InvalidToken(
                "token exceeds maximum size".to_string(),
            ));
        }

        let segments: Vec<&str> = token.split('.').collect();
        let header_segment = match segments.as_slice() {
            [header, payload, signature]
                if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
            {
                *header
            }
            _ => {
                return Err(AuthError::MalformedHeader(
                    "auth-header not in the format [header.payload.signature]".to_string(),
                ))
            }
        };

        let decoded = URL_SAFE_NO_PAD.decode(header_segment).map_err(|e| {
            AuthError::MalformedHeader(format!("cannot decode jwt-header: {e}"))
        })?;

        let header: JwtHeader = serde_json::from_slice(&decoded).map_err(|e| {
            AuthError::MalformedHeader(format!(
                "error unmarshalling the decoded jwt-header: {e}"
            ))
        })?;

        Ok(Self {
            header,
            token: token.to_string(),
        })
    }

    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    /// The original encoded token.
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

/// Where requests carry their token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <jwt>`
    #[default]
    Header,
    /// `Cookie: auth-token=<jwt>`
    Cookie,
}

impl FromStr for TokenSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(TokenSource::Header),
            "cookie" => Ok(TokenSource::Cookie),
            other => Err(format!("unknown token source '{other}'")),
        }
    }
}

impl TokenSource {
    /// Extract and structurally parse the token from request headers.
    ///
    /// # Errors
    ///
    /// `AuthError::MissingToken` when the header or cookie is absent, otherwise
    /// the errors of `BearerToken` parsing.
    pub fn extract(&self, headers: &HeaderMap) -> Result<BearerToken, AuthError> {
        match self {
            TokenSource::Header => {
                let value = headers
                    .get(AUTHORIZATION)
                    .ok_or(AuthError::MissingToken("authorization header"))?
                    .to_str()
                    .map_err(|_| {
                        AuthError::MalformedHeader(
                            "invalid auth-header: not visible ASCII".to_string(),
                        )
                    })?;
                BearerToken::from_authorization(value)
            }
            TokenSource::Cookie => {
                let token = find_cookie(headers, AUTH_COOKIE_NAME)
                    .ok_or(AuthError::MissingToken("cookie"))?;
                BearerToken::parse_compact(token)
            }
        }
    }
}

/// First value of cookie `name` across all `Cookie` headers.
fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}
