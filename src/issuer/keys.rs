//! Signing key generation and publication.
//!
//! A [`KeyManager`] is created once at issuer startup. It owns the RSA private
//! key and only ever hands out the public [`KeyDescriptor`] and signed tokens.

use std::fmt;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;

use crate::oauth::jwk::{KeyDescriptor, KeySet, KeySetDocument};

/// RSA modulus size for generated signing keys.
pub const RSA_KEY_BITS: usize = 2048;

/// Errors raised while generating keys or signing tokens.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to generate signing key: {0}")]
    Generation(String),

    #[error("failed to encode signing key: {0}")]
    Encoding(String),

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Holder of the process-wide signing key pair.
///
/// There is exactly one active key per process and no rotation. The private
/// half is never serialized or exposed; [`Debug`] prints only the key id.
pub struct KeyManager {
    encoding_key: EncodingKey,
    descriptor: KeyDescriptor,
}

impl KeyManager {
    /// Generate a fresh RS256 key pair.
    ///
    /// This is CPU-bound and takes noticeable time; call it once at startup,
    /// before serving.
    pub fn generate() -> Result<Self, KeyError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        Self::from_private_key(&private_key)
    }

    /// Build a key manager around an existing RSA private key.
    ///
    /// The key identifier depends only on the public material, so the same
    /// key yields the same `kid` across restarts.
    pub fn from_private_key(private_key: &RsaPrivateKey) -> Result<Self, KeyError> {
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let public_key = RsaPublicKey::from(private_key);
        let descriptor =
            KeyDescriptor::rsa(&public_key.n().to_bytes_be(), &public_key.e().to_bytes_be());

        tracing::info!(kid = %descriptor.kid, bits = RSA_KEY_BITS, "Signing key ready");

        Ok(Self {
            encoding_key,
            descriptor,
        })
    }

    /// The public descriptor of the active key.
    pub fn descriptor(&self) -> &KeyDescriptor {
        &self.descriptor
    }

    /// The active key identifier.
    pub fn kid(&self) -> &str {
        &self.descriptor.kid
    }

    /// The published key set: always exactly one key.
    pub fn key_set(&self) -> KeySetDocument {
        KeySetDocument::single(self.descriptor.clone())
    }

    /// The key set as a verifier sees it, for in-process verification.
    pub fn verification_keys(&self) -> KeySet {
        KeySet::from_document(&self.key_set())
    }

    /// Sign a claim set into a compact JWS, stamping the active `kid`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, KeyError> {
        self.sign_with_kid(claims, &self.descriptor.kid)
    }

    /// Sign with the active key but stamp an arbitrary `kid`.
    pub(crate) fn sign_with_kid<T: Serialize>(
        &self,
        claims: &T,
        kid: &str,
    ) -> Result<String, KeyError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        Ok(jsonwebtoken::encode(&header, claims, &self.encoding_key)?)
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("kid", &self.descriptor.kid)
            .finish_non_exhaustive()
    }
}
