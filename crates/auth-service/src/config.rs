//! Auth service configuration.
//!
//! Configuration is loaded from environment variables. Secrets are held as
//! `SecretString` and redacted in Debug output.

use crate::auth::token::TokenSource;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default refresh interval after a successful JWKS fetch (30 minutes).
pub const DEFAULT_JWKS_VALIDITY_FREQUENCY_SECONDS: u64 = 1800;

/// Default retry interval after a failed JWKS fetch.
pub const DEFAULT_JWKS_RETRY_SECONDS: u64 = 3;

/// Default JWKS fetch timeout.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Maximum JWKS fetch timeout.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

pub const DEFAULT_SIGNING_KEY_ID: &str = "picshot-key-01";

/// Default lifetime of minted tokens (24 hours).
pub const DEFAULT_TOKEN_LIFETIME_SECONDS: u64 = 86_400;

/// Default graceful shutdown drain period.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// How this service signs the tokens it issues.
#[derive(Clone)]
pub enum SigningMode {
    /// RS256 with a PEM private key read from `key_path`.
    Rsa { key_path: String, key_id: String },
    /// HS512 with a shared secret.
    Hmac { access_key: SecretString },
}

impl fmt::Debug for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningMode::Rsa { key_path, key_id } => f
                .debug_struct("Rsa")
                .field("key_path", key_path)
                .field("key_id", key_id)
                .finish(),
            SigningMode::Hmac { .. } => f
                .debug_struct("Hmac")
                .field("access_key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Auth service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Remote JWKS endpoint used to validate incoming tokens.
    pub jwks_url: String,

    /// Refresh interval after a successful fetch.
    pub jwks_validity_frequency: Duration,

    /// Refresh interval after a failed fetch.
    pub jwks_retry_interval: Duration,

    pub jwks_fetch_timeout: Duration,

    pub signing_mode: SigningMode,

    pub token_source: TokenSource,

    pub token_lifetime: Duration,

    /// How long in-flight requests get to finish on shutdown.
    pub drain_period: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let jwks_url = vars
            .get("JWKS_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8080/.well-known/jwks.json".to_string());

        let jwks_validity_frequency = parse_seconds(
            vars,
            "JWKS_VALIDITY_FREQUENCY_SECONDS",
            DEFAULT_JWKS_VALIDITY_FREQUENCY_SECONDS,
            1,
            u64::MAX,
        )?;

        let jwks_retry_interval = parse_seconds(
            vars,
            "JWKS_RETRY_SECONDS",
            DEFAULT_JWKS_RETRY_SECONDS,
            1,
            u64::MAX,
        )?;

        let jwks_fetch_timeout = parse_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            1,
            MAX_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;

        let signing_mode = match vars.get("SIGNING_MODE").map(|m| m.to_ascii_lowercase()) {
            None => parse_rsa_mode(vars)?,
            Some(mode) if mode == "rsa" => parse_rsa_mode(vars)?,
            Some(mode) if mode == "hmac" => {
                let access_key = vars
                    .get("ACCESS_KEY")
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| ConfigError::MissingEnvVar("ACCESS_KEY".to_string()))?;
                SigningMode::Hmac {
                    access_key: SecretString::from(access_key.clone()),
                }
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "SIGNING_MODE".to_string(),
                    reason: format!("expected 'rsa' or 'hmac', got '{other}'"),
                })
            }
        };

        let token_source = match vars.get("TOKEN_SOURCE") {
            Some(value) => value
                .parse::<TokenSource>()
                .map_err(|reason| ConfigError::InvalidValue {
                    name: "TOKEN_SOURCE".to_string(),
                    reason,
                })?,
            None => TokenSource::default(),
        };

        let token_lifetime = parse_seconds(
            vars,
            "TOKEN_LIFETIME_SECONDS",
            DEFAULT_TOKEN_LIFETIME_SECONDS,
            1,
            u64::MAX,
        )?;

        let drain_period =
            parse_seconds(vars, "DRAIN_SECONDS", DEFAULT_DRAIN_SECONDS, 0, u64::MAX)?;

        Ok(Config {
            bind_address,
            jwks_url,
            jwks_validity_frequency,
            jwks_retry_interval,
            jwks_fetch_timeout,
            signing_mode,
            token_source,
            token_lifetime,
            drain_period,
        })
    }
}

fn parse_rsa_mode(vars: &HashMap<String, String>) -> Result<SigningMode, ConfigError> {
    let key_path = vars
        .get("SIGNING_KEY_PATH")
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("SIGNING_KEY_PATH".to_string()))?
        .clone();

    let key_id = vars
        .get("SIGNING_KEY_ID")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SIGNING_KEY_ID.to_string());

    Ok(SigningMode::Rsa { key_path, key_id })
}

/// Parse a whole number of seconds within `min..=max`, or return the default.
fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a non-negative integer, got '{value_str}': {e}"),
    })?;

    if value < min || value > max {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("must be between {min} and {max}, got {value}"),
        });
    }

    Ok(Duration::from_secs(value))
}
