//! Client authentication for the token endpoint.
//!
//! Supports the two methods advertised in the discovery document:
//! `client_secret_basic` (HTTP Basic) and `client_secret_post` (form fields).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::secret::SecretString;

/// The single registered machine client.
#[derive(Debug, Clone)]
pub struct ClientCredential {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredential {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::with_label(client_secret, "CLIENT_SECRET"),
        }
    }
}

/// Validates presented client credentials against the registered client.
///
/// A pure predicate: no state, no side effects.
#[derive(Debug, Clone)]
pub struct ClientAuthenticator {
    client: ClientCredential,
}

impl ClientAuthenticator {
    pub fn new(client: ClientCredential) -> Self {
        Self { client }
    }

    /// The registered client identifier.
    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    /// Authenticate a token request.
    ///
    /// An HTTP Basic credential takes precedence: when the `Authorization`
    /// header uses the Basic scheme it alone decides the outcome, and a
    /// malformed value is a rejection even if valid form fields are present.
    /// Otherwise both form fields must be present and non-empty.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        form_client_id: Option<&str>,
        form_client_secret: Option<&str>,
    ) -> bool {
        if let Some(encoded) = authorization.and_then(basic_payload) {
            return match decode_basic(encoded) {
                Some((id, secret)) => self.matches(&id, &secret),
                None => false,
            };
        }

        match (form_client_id, form_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                self.matches(id, secret)
            }
            _ => false,
        }
    }

    fn matches(&self, client_id: &str, client_secret: &str) -> bool {
        // Evaluate both comparisons so timing does not reveal which one failed
        let id_ok = SecretString::new(self.client.client_id.as_str()).matches(client_id);
        let secret_ok = self.client.client_secret.matches(client_secret);
        id_ok & secret_ok
    }
}

/// Strip a case-insensitive `Basic ` scheme prefix.
fn basic_payload(header: &str) -> Option<&str> {
    let header = header.trim_start();
    let (scheme, rest) = header.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("basic")
        .then(|| rest.trim())
}

/// Decode `base64(id:secret)`. The secret may itself contain colons.
fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let bytes = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}
