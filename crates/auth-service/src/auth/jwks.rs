//! JSON Web Key Set.

use crate::auth::jwk::Jwk;
use crate::auth::signer::TokenSigner;
use serde::{Deserialize, Serialize};

/// An ordered set of JSON Web Keys, as served at `/.well-known/jwks.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// The set this service publishes for its own signing key.
    pub fn from_signer(signer: &TokenSigner) -> Self {
        signer.public_jwks()
    }

    /// First key whose `kid` matches exactly, in publication order.
    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
