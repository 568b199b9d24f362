//! OAuth 2.1 authorization server for machine clients.
//!
//! Issues short-lived RS256 access tokens through the `client_credentials`
//! grant and publishes the key that verifies them.
//!
//! - [`KeyManager`]: the process-wide signing key and its public descriptor
//! - [`ClientAuthenticator`]: `client_secret_basic` / `client_secret_post`
//! - [`TokenIssuer`]: grant type and scope checks, claim assembly, signing
//! - [`AuthorizationServer`]: the HTTP routes, including `/jwks.json`

pub mod client;
pub mod keys;
pub mod metadata;
pub mod server;
pub mod token;

pub use client::{ClientAuthenticator, ClientCredential};
pub use keys::{KeyError, KeyManager, RSA_KEY_BITS};
pub use metadata::AuthorizationServerMetadata;
pub use server::AuthorizationServer;
pub use token::{AccessTokenClaims, CLIENT_CREDENTIALS, ErrorBody, IssueError, IssuedToken, TokenIssuer};

#[cfg(test)]
static TEST_KEYS: std::sync::OnceLock<std::sync::Arc<KeyManager>> = std::sync::OnceLock::new();

/// One generated key shared by every unit test; RSA keygen is slow.
#[cfg(test)]
pub(crate) fn shared_test_keys() -> std::sync::Arc<KeyManager> {
    TEST_KEYS
        .get_or_init(|| std::sync::Arc::new(KeyManager::generate().unwrap()))
        .clone()
}

#[cfg(test)]
pub(crate) fn test_keys() -> &'static KeyManager {
    TEST_KEYS.get_or_init(|| std::sync::Arc::new(KeyManager::generate().unwrap()))
}
