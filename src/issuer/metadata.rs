//! Authorization server discovery document.
//!
//! Served at `/.well-known/openid-configuration` so clients can find the token
//! endpoint and the key set without out-of-band configuration.

use serde::{Deserialize, Serialize};

use super::token::CLIENT_CREDENTIALS;

/// Path the discovery document is served at.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Path the key set is served at.
pub const JWKS_PATH: &str = "/jwks.json";

/// Path of the token endpoint.
pub const TOKEN_PATH: &str = "/token";

/// Authorization server metadata (RFC 8414 Section 2, OIDC discovery subset).
///
/// # Example
///
/// ```rust
/// use mcp_gatekeeper::issuer::AuthorizationServerMetadata;
///
/// let metadata = AuthorizationServerMetadata::new("http://localhost:8080")
///     .scope("file.read")
///     .scope("file.list");
/// assert_eq!(metadata.token_endpoint, "http://localhost:8080/token");
/// assert_eq!(metadata.jwks_uri, "http://localhost:8080/jwks.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier; also the `iss` claim of every token.
    pub issuer: String,

    pub token_endpoint: String,

    pub jwks_uri: String,

    pub grant_types_supported: Vec<String>,

    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// The scope universe.
    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Metadata for an issuer, with endpoints derived from its URL.
    pub fn new(issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let base = issuer.trim_end_matches('/');
        Self {
            token_endpoint: format!("{base}{TOKEN_PATH}"),
            jwks_uri: format!("{base}{JWKS_PATH}"),
            issuer,
            grant_types_supported: vec![CLIENT_CREDENTIALS.to_string()],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_basic".to_string(),
                "client_secret_post".to_string(),
            ],
            scopes_supported: Vec::new(),
        }
    }

    /// Add a supported scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes_supported.push(scope.into());
        self
    }

    /// Replace the supported scopes.
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes_supported = scopes.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization() {
        let metadata = AuthorizationServerMetadata::new("http://auth.test")
            .scopes(["file.read", "file.list"]);

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "issuer": "http://auth.test",
                "token_endpoint": "http://auth.test/token",
                "jwks_uri": "http://auth.test/jwks.json",
                "grant_types_supported": ["client_credentials"],
                "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
                "scopes_supported": ["file.read", "file.list"]
            })
        );
    }

    #[test]
    fn test_trailing_slash_in_issuer() {
        let metadata = AuthorizationServerMetadata::new("http://auth.test/");
        assert_eq!(metadata.issuer, "http://auth.test/");
        assert_eq!(metadata.token_endpoint, "http://auth.test/token");
    }
}
