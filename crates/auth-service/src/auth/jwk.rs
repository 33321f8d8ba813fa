//! JSON Web Key with lazy RSA public key reconstruction.
//!
//! A `Jwk` carries the base64url modulus and exponent exactly as published.
//! The first call to `rsa_public_key()` decodes them into an `RsaVerifyingKey`
//! and memoizes the result, so every later verification against the same key
//! set snapshot reuses the decoded key.

use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Key type for RSA keys.
pub const KTY_RSA: &str = "RSA";

/// Widest public exponent accepted, in bytes.
const MAX_EXPONENT_BYTES: usize = 8;

/// JSON Web Key as published in a JWKS document.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Jwk {
    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: String,

    #[serde(default)]
    pub alg: String,

    /// Key type (`RSA` for every key this service can use).
    #[serde(default)]
    pub kty: String,

    #[serde(default, rename = "use")]
    pub key_use: String,

    #[serde(default)]
    pub key_ops: Vec<String>,

    /// Modulus, base64url without padding, big-endian.
    #[serde(default, rename = "n")]
    pub modulus: String,

    /// Public exponent, base64url without padding, big-endian.
    #[serde(default, rename = "e")]
    pub exponent: String,

    #[serde(skip)]
    rsa_key: OnceLock<Arc<RsaVerifyingKey>>,
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("kty", &self.kty)
            .field("use", &self.key_use)
            .field("key_ops", &self.key_ops)
            .field("decoded", &self.rsa_key.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Jwk {
    /// Build the public JWK for an RSA key this service signs with.
    pub fn from_rsa_public_key(kid: &str, public_key: &RsaPublicKey) -> Self {
        Self {
            kid: kid.to_string(),
            alg: "RS256".to_string(),
            kty: KTY_RSA.to_string(),
            key_use: "sig".to_string(),
            key_ops: vec!["verify".to_string()],
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            rsa_key: OnceLock::new(),
        }
    }

    pub fn is_rsa(&self) -> bool {
        self.kty == KTY_RSA
    }

    /// Decoded RSA public key, computed on first use and then reused.
    ///
    /// Concurrent first calls may each decode, but all of them return the
    /// single value that won the initialization.
    ///
    /// # Errors
    ///
    /// `AuthError::UnusableKey` if the modulus or exponent does not decode to
    /// a valid RSA public key.
    pub fn rsa_public_key(&self) -> Result<Arc<RsaVerifyingKey>, AuthError> {
        if let Some(key) = self.rsa_key.get() {
            return Ok(Arc::clone(key));
        }

        let decoded = Arc::new(RsaVerifyingKey::from_components(
            &self.modulus,
            &self.exponent,
        )?);

        tracing::debug!(target: "auth.jwks", kid = %self.kid, "Decoded RSA public key");
        Ok(Arc::clone(self.rsa_key.get_or_init(|| decoded)))
    }
}

/// RSA public key decoded from a JWK, ready for RS256 verification.
pub struct RsaVerifyingKey {
    public_key: RsaPublicKey,
    exponent: u64,
    decoding_key: DecodingKey,
}

impl fmt::Debug for RsaVerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaVerifyingKey")
            .field("modulus_bits", &self.public_key.n().bits())
            .field("exponent", &self.exponent)
            .finish_non_exhaustive()
    }
}

impl RsaVerifyingKey {
    /// Decode base64url modulus and exponent into a public key.
    ///
    /// # Errors
    ///
    /// `AuthError::UnusableKey` on bad base64, an empty modulus, an empty or
    /// over-long exponent, or parameters the RSA implementation refuses.
    pub fn from_components(modulus_b64: &str, exponent_b64: &str) -> Result<Self, AuthError> {
        let modulus_bytes = URL_SAFE_NO_PAD
            .decode(modulus_b64)
            .map_err(|e| AuthError::UnusableKey(format!("cannot decode modulus: {e}")))?;
        if modulus_bytes.is_empty() {
            return Err(AuthError::UnusableKey("empty modulus".to_string()));
        }

        let exponent = decode_exponent(exponent_b64)?;
        let modulus = BigUint::from_bytes_be(&modulus_bytes);

        let public_key = RsaPublicKey::new(modulus, BigUint::from(exponent))
            .map_err(|e| AuthError::UnusableKey(format!("invalid RSA public key: {e}")))?;

        // ring rejects leading zero bytes, so feed it the minimal encodings
        let decoding_key = DecodingKey::from_rsa_raw_components(
            &public_key.n().to_bytes_be(),
            &public_key.e().to_bytes_be(),
        );

        Ok(Self {
            public_key,
            exponent,
            decoding_key,
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn exponent(&self) -> u64 {
        self.exponent
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Decode a base64url big-endian exponent of 1 to 8 bytes.
///
/// Shorter encodings are left-padded with zeros before conversion.
pub fn decode_exponent(exponent_b64: &str) -> Result<u64, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(exponent_b64)
        .map_err(|e| AuthError::UnusableKey(format!("cannot decode exponent: {e}")))?;

    if bytes.is_empty() {
        return Err(AuthError::UnusableKey("empty exponent".to_string()));
    }
    if bytes.len() > MAX_EXPONENT_BYTES {
        return Err(AuthError::UnusableKey(format!(
            "exponent is {} bytes, at most {MAX_EXPONENT_BYTES} supported",
            bytes.len()
        )));
    }

    let mut padded = vec![0u8; MAX_EXPONENT_BYTES - bytes.len()];
    padded.extend_from_slice(&bytes);
    let array: [u8; MAX_EXPONENT_BYTES] = padded
        .try_into()
        .map_err(|_| AuthError::UnusableKey("exponent padding failed".to_string()))?;

    Ok(u64::from_be_bytes(array))
}
