//! Access token verification.
//!
//! Provides the [`TokenValidator`] trait the connection gate is generic over,
//! [`JwtValidator`] for verification against a key set held in memory, and the
//! verification steps shared with the remote-JWKS validator.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::error::OAuthError;
use super::jwk::{KeySet, KeySetDocument};
use super::scope::parse_scopes;

/// Audience claim value, which can be a single string or array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenAudience {
    /// A single audience string.
    Single(String),
    /// Multiple audience strings.
    Multiple(Vec<String>),
}

impl TokenAudience {
    /// Check if the audience contains a specific value.
    pub fn contains(&self, value: &str) -> bool {
        match self {
            TokenAudience::Single(s) => s == value,
            TokenAudience::Multiple(v) => v.iter().any(|s| s == value),
        }
    }
}

/// Verified token claims.
///
/// Contains the registered claims the gateway relies on plus an `extra` map
/// for anything else the issuer put in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the client identifier for client_credentials tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<TokenAudience>,

    /// Issued-at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Space-delimited scope string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Additional claims not covered by the fields above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Parse the scope string into a set of individual scopes.
    pub fn scopes(&self) -> BTreeSet<String> {
        parse_scopes(self.scope.as_deref().unwrap_or("")).into_iter().collect()
    }

    /// Check if the token has a specific scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(scope)
    }
}

/// Trait for validating access tokens.
///
/// Implementations verify the signature and the registered claims and return
/// the claims on success. Scope checks happen afterwards, in the gate.
pub trait TokenValidator: Clone + Send + Sync + 'static {
    /// Validate an access token and return the extracted claims.
    fn validate_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<TokenClaims, OAuthError>> + Send;
}

/// Claims a token must carry to be accepted, beyond a valid signature.
#[derive(Debug, Clone, Default)]
pub struct ExpectedClaims {
    /// Required `iss` value.
    pub issuer: Option<String>,
    /// Required `aud` member.
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`.
    pub leeway: Duration,
}

impl ExpectedClaims {
    /// Build the `jsonwebtoken` validation rules.
    ///
    /// Only RS256 is accepted, so a token cannot pick a weaker algorithm.
    /// `exp` and `sub` are always required; `iss` and `aud` are required when
    /// an expected value is configured.
    pub(crate) fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway.as_secs();

        let mut required = vec!["exp", "sub"];
        match &self.issuer {
            Some(issuer) => {
                validation.set_issuer(&[issuer]);
                required.push("iss");
            }
            None => validation.iss = None,
        }
        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);
        validation
    }
}

/// Read the key identifier from a token header without verifying anything.
pub(crate) fn token_kid(token: &str) -> Result<String, OAuthError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| OAuthError::InvalidToken {
        description: e.to_string(),
    })?;
    header.kid.ok_or_else(|| OAuthError::InvalidToken {
        description: "token header has no kid".to_string(),
    })
}

/// Verify signature and registered claims with an already-resolved key.
pub(crate) fn verify_with_key(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<TokenClaims, OAuthError> {
    jsonwebtoken::decode::<TokenClaims>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => OAuthError::ExpiredToken,
            ErrorKind::InvalidAudience => OAuthError::InvalidAudience,
            ErrorKind::InvalidIssuer => OAuthError::InvalidIssuer,
            _ => OAuthError::InvalidToken {
                description: e.to_string(),
            },
        })
}

/// JWT validator using a key set held in memory.
///
/// Use this when the verifier runs in the issuer's process or the key set is
/// provisioned statically. For a remote issuer, see
/// [`JwksValidator`](super::jwks::JwksValidator).
///
/// # Example
///
/// ```rust
/// use mcp_gatekeeper::oauth::{JwtValidator, KeySet};
///
/// let validator = JwtValidator::new(KeySet::new())
///     .expected_issuer("http://localhost:8080")
///     .expected_audience("mcp-server");
/// ```
#[derive(Clone)]
pub struct JwtValidator {
    keys: KeySet,
    expected: ExpectedClaims,
    validation: Arc<Validation>,
}

impl JwtValidator {
    /// Create a validator over a fixed key set.
    pub fn new(keys: KeySet) -> Self {
        let expected = ExpectedClaims::default();
        let validation = Arc::new(expected.validation());
        Self {
            keys,
            expected,
            validation,
        }
    }

    /// Create a validator from a published JWKS document.
    pub fn from_document(document: &KeySetDocument) -> Self {
        Self::new(KeySet::from_document(document))
    }

    /// Require the given `iss` claim.
    pub fn expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected.issuer = Some(issuer.into());
        self.rebuild()
    }

    /// Require the given `aud` claim.
    pub fn expected_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected.audience = Some(audience.into());
        self.rebuild()
    }

    /// Tolerate clock skew on expiry. Defaults to zero.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.expected.leeway = leeway;
        self.rebuild()
    }

    fn rebuild(mut self) -> Self {
        self.validation = Arc::new(self.expected.validation());
        self
    }
}

impl TokenValidator for JwtValidator {
    async fn validate_token(&self, token: &str) -> Result<TokenClaims, OAuthError> {
        let kid = token_kid(token)?;
        let key = self.keys.get(&kid).ok_or(OAuthError::UnknownKey { kid })?;
        verify_with_key(token, &key, &self.validation)
    }
}
