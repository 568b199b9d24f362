//! JSON Web Key descriptors and key sets (RFC 7517).
//!
//! [`KeyDescriptor`] is the public half of the issuer's signing key as it
//! appears on the wire. [`KeySetDocument`] is the `{"keys": [...]}` document
//! served at `/jwks.json`. [`KeySet`] is the verifier's view of that document:
//! a map from key identifier to a ready-to-use decoding key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Signing algorithm advertised in key descriptors and token headers.
pub const SIGNING_ALGORITHM: &str = "RS256";

/// Number of hex characters kept from the key thumbprint.
const KID_LENGTH: usize = 16;

/// Public-key descriptor for an RSA signing key.
///
/// Serializes as a JWK: `{"kty":"RSA","kid":...,"alg":"RS256","use":"sig","n":...,"e":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    /// Key type, always `RSA`.
    pub kty: String,
    /// Key identifier derived from the public-key material.
    #[serde(default)]
    pub kid: String,
    /// Algorithm the key is used with.
    #[serde(default = "default_alg")]
    pub alg: String,
    /// Intended key use, `sig` for signing keys.
    #[serde(rename = "use", default = "default_use")]
    pub key_use: String,
    /// RSA modulus, base64url without padding.
    #[serde(default)]
    pub n: String,
    /// RSA public exponent, base64url without padding.
    #[serde(default)]
    pub e: String,
}

fn default_alg() -> String {
    SIGNING_ALGORITHM.to_string()
}

fn default_use() -> String {
    "sig".to_string()
}

impl KeyDescriptor {
    /// Build a descriptor from big-endian RSA modulus and exponent bytes.
    ///
    /// The key identifier is computed from the material, so the same key
    /// always yields the same `kid`.
    pub fn rsa(modulus: &[u8], exponent: &[u8]) -> Self {
        let n = URL_SAFE_NO_PAD.encode(modulus);
        let e = URL_SAFE_NO_PAD.encode(exponent);
        let kid = rsa_thumbprint(&n, &e);
        Self {
            kty: "RSA".to_string(),
            kid,
            alg: default_alg(),
            key_use: default_use(),
            n,
            e,
        }
    }

    /// Convert to a `jsonwebtoken` decoding key.
    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        DecodingKey::from_rsa_components(&self.n, &self.e)
    }

    /// Whether this descriptor can verify RS256 signatures.
    pub fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && self.alg == SIGNING_ALGORITHM
            && self.key_use == "sig"
            && !self.kid.is_empty()
    }
}

/// Key identifier for an RSA public key.
///
/// Hex SHA-256 over the RFC 7638 canonical member ordering, truncated.
fn rsa_thumbprint(n: &str, e: &str) -> String {
    let canonical = format!(r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#, e, n);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut kid = hex::encode(digest);
    kid.truncate(KID_LENGTH);
    kid
}

/// The JWKS document: `{"keys": [KeyDescriptor, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetDocument {
    pub keys: Vec<KeyDescriptor>,
}

impl KeySetDocument {
    /// A document containing a single key.
    pub fn single(key: KeyDescriptor) -> Self {
        Self { keys: vec![key] }
    }
}

/// Verification keys indexed by key identifier.
///
/// Cheap to clone; the decoding keys are shared.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<DecodingKey>>,
}

impl KeySet {
    /// Create an empty key set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key set from a published document.
    ///
    /// Keys that are not RS256 signing keys, or whose material does not
    /// decode, are skipped with a warning. A verifier must never fall back
    /// to a key it could not index.
    pub fn from_document(document: &KeySetDocument) -> Self {
        let mut keys = HashMap::new();
        for descriptor in &document.keys {
            if !descriptor.is_rs256_signing_key() {
                tracing::warn!(kid = %descriptor.kid, kty = %descriptor.kty, alg = %descriptor.alg, "Skipping unsupported key");
                continue;
            }
            match descriptor.decoding_key() {
                Ok(key) => {
                    keys.insert(descriptor.kid.clone(), Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(kid = %descriptor.kid, error = %e, "Skipping undecodable key");
                }
            }
        }
        Self { keys }
    }

    /// Look up a verification key by key identifier.
    pub fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key identifiers currently known.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet").field("kids", &self.kids()).finish()
    }
}

impl From<&KeySetDocument> for KeySet {
    fn from(document: &KeySetDocument) -> Self {
        Self::from_document(document)
    }
}
