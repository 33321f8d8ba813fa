//! JWT claims structure.
//!
//! Contains the claims carried by tokens this service issues and accepts. The
//! `user_id` field is redacted in Debug output to prevent exposure in logs.

use crate::errors::AuthError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default lifetime of a newly issued token (24 hours).
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// JWT Claims structure for issued and validated tokens.
///
/// Missing numeric claims deserialize to zero, which `valid()` then rejects
/// (an absent `exp` reads as already expired, an absent `user_id` as anonymous).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier - redacted in Debug output.
    #[serde(default)]
    pub user_id: i64,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default)]
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default)]
    pub nbf: i64,

    /// Unique token identifier (UUID v4).
    #[serde(default)]
    pub jti: String,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("user_id", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("jti", &self.jti)
            .finish()
    }
}

impl Claims {
    /// Claims for `user_id` issued now, expiring after `lifetime`.
    pub fn new(user_id: i64, lifetime: Duration) -> Self {
        let now = Utc::now().timestamp();
        let lifetime_secs = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        Self {
            user_id,
            exp: now.saturating_add(lifetime_secs),
            iat: now,
            nbf: now,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Check expiry and identity against the current time.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenExpired` when `now > exp` (no leeway)
    /// - `AuthError::MissingUserId` when `user_id == 0`
    pub fn valid(&self) -> Result<(), AuthError> {
        self.valid_at(Utc::now().timestamp())
    }

    /// Same as `valid()` with an explicit clock.
    pub fn valid_at(&self, now: i64) -> Result<(), AuthError> {
        if now > self.exp {
            return Err(AuthError::TokenExpired);
        }

        if self.user_id == 0 {
            return Err(AuthError::MissingUserId);
        }

        Ok(())
    }
}
