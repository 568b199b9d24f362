//! Credential extraction and API-key validation for the gateway.
//!
//! The gateway reads credentials from the upgrade request only:
//!
//! - `Authorization: Bearer <token>` for OAuth access tokens
//! - `X-API-Key: <key>` or the `api_key` query parameter in API-key mode
//!
//! The query parameter exists for WebSocket clients (browsers) that cannot
//! set headers on the upgrade request.

use axum::http::{HeaderMap, Uri, header};

use crate::oauth::OAuthError;
use crate::secret::SecretString;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the API key.
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// Credentials found on an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentedCredentials {
    /// Token from `Authorization: Bearer`.
    pub bearer: Option<String>,
    /// Key from `X-API-Key`, or the `api_key` query parameter.
    pub api_key: Option<String>,
}

impl PresentedCredentials {
    /// Extract credentials from request headers and URI.
    ///
    /// The header wins when both the header and the query parameter carry
    /// an API key. Empty values count as absent.
    pub fn from_request_parts(headers: &HeaderMap, uri: &Uri) -> Self {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .map(String::from);

        let api_key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .or_else(|| api_key_from_query(uri));

        Self { bearer, api_key }
    }
}

fn api_key_from_query(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == API_KEY_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|k| !k.is_empty())
}

/// Extract a bearer token from an Authorization header.
///
/// The scheme is matched case-insensitively (RFC 7235 Section 2.1).
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Validator for the single shared API key of the reduced gateway mode.
///
/// API keys carry no claims, so the gate assigns them a fixed scope set.
#[derive(Debug, Clone)]
pub struct ApiKeyValidator {
    key: SecretString,
}

impl ApiKeyValidator {
    /// Create a validator for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: SecretString::with_label(key, "API_KEY"),
        }
    }

    /// Check a presented key in constant time.
    pub fn validate(&self, presented: Option<&str>) -> Result<(), OAuthError> {
        match presented {
            None => Err(OAuthError::MissingToken),
            Some(key) if self.key.matches(key) => Ok(()),
            Some(_) => Err(OAuthError::InvalidApiKey),
        }
    }
}

impl From<SecretString> for ApiKeyValidator {
    fn from(key: SecretString) -> Self {
        Self { key }
    }
}
