//! Token issuance.
//!
//! `TokenSigner` turns `Claims` into a signed compact JWT. In RSA mode the
//! matching public key is exposed as a JWKS so peers (and this service) can
//! verify what it issues.

use crate::auth::claims::Claims;
use crate::auth::jwk::Jwk;
use crate::auth::jwks::Jwks;
use crate::config::{Config, SigningMode};
use crate::errors::AuthError;
use crate::observability::metrics::record_token_issued;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;
use tracing::instrument;

enum SigningKey {
    Rsa {
        kid: String,
        encoding_key: EncodingKey,
        public_jwk: Jwk,
    },
    Hmac {
        encoding_key: EncodingKey,
    },
}

/// Signs tokens for this service.
pub struct TokenSigner {
    key: SigningKey,
    lifetime: Duration,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("TokenSigner");
        debug.field("algorithm", &self.algorithm());
        if let SigningKey::Rsa { kid, .. } = &self.key {
            debug.field("kid", kid);
        }
        debug.field("lifetime", &self.lifetime).finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// RS256 signer from a PKCS#1 or PKCS#8 PEM private key.
    ///
    /// # Errors
    ///
    /// `AuthError::Signing` if the PEM is not an RSA private key.
    pub fn rsa_from_pem(kid: &str, pem: &str, lifetime: Duration) -> Result<Self, AuthError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| AuthError::Signing(format!("invalid RSA private key: {e}")))?;

        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::Signing(format!("invalid RSA private key: {e}")))?;

        let public_jwk = Jwk::from_rsa_public_key(kid, &private_key.to_public_key());

        Ok(Self {
            key: SigningKey::Rsa {
                kid: kid.to_string(),
                encoding_key,
                public_jwk,
            },
            lifetime,
        })
    }

    /// HS512 signer from a shared secret.
    pub fn hmac(access_key: &SecretString, lifetime: Duration) -> Self {
        Self {
            key: SigningKey::Hmac {
                encoding_key: EncodingKey::from_secret(access_key.expose_secret().as_bytes()),
            },
            lifetime,
        }
    }

    /// Build the signer described by `config`, reading the PEM from disk in
    /// RSA mode.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        match &config.signing_mode {
            SigningMode::Rsa { key_path, key_id } => {
                let pem = std::fs::read_to_string(key_path).map_err(|e| {
                    AuthError::Signing(format!("cannot read signing key '{key_path}': {e}"))
                })?;
                Self::rsa_from_pem(key_id, &pem, config.token_lifetime)
            }
            SigningMode::Hmac { access_key } => Ok(Self::hmac(access_key, config.token_lifetime)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self.key {
            SigningKey::Rsa { .. } => Algorithm::RS256,
            SigningKey::Hmac { .. } => Algorithm::HS512,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign `claims` as a compact JWT.
    ///
    /// # Errors
    ///
    /// `AuthError::Signing` when encoding fails.
    #[instrument(skip_all)]
    pub fn create_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let mut header = Header::new(self.algorithm());
        header.typ = Some("JWT".to_string());

        let encoding_key = match &self.key {
            SigningKey::Rsa {
                kid, encoding_key, ..
            } => {
                header.kid = Some(kid.clone());
                encoding_key
            }
            SigningKey::Hmac { encoding_key } => encoding_key,
        };

        match encode(&header, claims, encoding_key) {
            Ok(token) => {
                record_token_issued("success");
                Ok(token)
            }
            Err(e) => {
                record_token_issued("error");
                tracing::error!(target: "auth.token", error = %e, "Token signing failed");
                Err(AuthError::Signing(e.to_string()))
            }
        }
    }

    /// Issue a fresh token for `user_id` with the configured lifetime.
    pub fn issue(&self, user_id: i64) -> Result<String, AuthError> {
        self.create_token(&Claims::new(user_id, self.lifetime))
    }

    /// Public keys peers use to verify this signer's tokens. Empty in HMAC
    /// mode.
    pub fn public_jwks(&self) -> Jwks {
        match &self.key {
            SigningKey::Rsa { public_jwk, .. } => Jwks::new(vec![public_jwk.clone()]),
            SigningKey::Hmac { .. } => Jwks::default(),
        }
    }
}
