//! Builder for test token claims
//!
//! Mirrors the claim layout issued by the auth service so tests can sign
//! arbitrary (including invalid) payloads without going through the signer.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// Claims payload as it appears inside a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestClaims {
    pub user_id: i64,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
}

/// Builder for `TestClaims` with sensible defaults.
///
/// Defaults: `user_id = 42`, issued now, expires in one hour.
pub struct TestClaimsBuilder {
    claims: TestClaims,
}

impl TestClaimsBuilder {
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            claims: TestClaims {
                user_id: 42,
                exp: now + 3600,
                iat: now,
                nbf: now,
                jti: uuid::Uuid::new_v4().to_string(),
            },
        }
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.claims.user_id = user_id;
        self
    }

    /// Expire the token `by` in the past.
    pub fn expired_by(mut self, by: Duration) -> Self {
        self.claims.exp = Utc::now().timestamp() - by.num_seconds();
        self
    }

    pub fn expires_at(mut self, exp: i64) -> Self {
        self.claims.exp = exp;
        self
    }

    pub fn build(self) -> TestClaims {
        self.claims
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unexpired() {
        let claims = TestClaimsBuilder::new().build();
        assert!(claims.exp > Utc::now().timestamp());
        assert_eq!(claims.user_id, 42);
    }

    #[test]
    fn test_expired_by_sets_past_expiry() {
        let claims = TestClaimsBuilder::new()
            .expired_by(Duration::minutes(5))
            .build();
        assert!(claims.exp < Utc::now().timestamp());
    }
}
