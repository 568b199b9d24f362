//! Scope-constrained token issuance for the `client_credentials` grant.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::keys::{KeyError, KeyManager};
use crate::oauth::scope::{join_scopes, parse_scopes};

/// The only grant type the issuer supports.
pub const CLIENT_CREDENTIALS: &str = "client_credentials";

/// Claims carried by an issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub aud: String,
    /// Always the registered client identifier.
    pub sub: String,
    /// Granted scopes, space-delimited in request order.
    pub scope: String,
    pub iat: u64,
    pub exp: u64,
}

/// Successful token response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

/// Errors returned by the token endpoint.
///
/// Rendered as `{error, error_description}` JSON with the matching status.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("Client authentication failed")]
    InvalidClient,

    #[error("Only client_credentials grant is supported")]
    UnsupportedGrantType,

    #[error("Unsupported scopes requested: {}", .scopes.join(", "))]
    InvalidScope { scopes: Vec<String> },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Token could not be issued")]
    ServerError(#[source] KeyError),

    #[error("Token lifetime does not fit the expiry claim")]
    ExpiryOverflow,
}

impl IssueError {
    /// OAuth error code (RFC 6749 Section 5.2).
    pub fn error_code(&self) -> &'static str {
        match self {
            IssueError::InvalidClient => "invalid_client",
            IssueError::UnsupportedGrantType => "unsupported_grant_type",
            IssueError::InvalidScope { .. } => "invalid_scope",
            IssueError::InvalidRequest(_) => "invalid_request",
            IssueError::ServerError(_) | IssueError::ExpiryOverflow => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IssueError::InvalidClient => StatusCode::UNAUTHORIZED,
            IssueError::ServerError(_) | IssueError::ExpiryOverflow => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Wire form of an issuer error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

impl From<&IssueError> for ErrorBody {
    fn from(err: &IssueError) -> Self {
        Self {
            error: err.error_code().to_string(),
            error_description: err.to_string(),
        }
    }
}

impl IntoResponse for IssueError {
    fn into_response(self) -> Response {
        if let IssueError::ServerError(source) = &self {
            tracing::error!(error = %source, "Token signing failed");
        }
        (self.status_code(), Json(ErrorBody::from(&self))).into_response()
    }
}

/// Mints access tokens for the registered client.
///
/// Cheap to clone; the signing key is shared.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyManager>,
    issuer: String,
    audience: String,
    client_id: String,
    scopes: Vec<String>,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer. `scopes` is the scope universe tokens may carry.
    pub fn new(
        keys: Arc<KeyManager>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        client_id: impl Into<String>,
        scopes: Vec<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            client_id: client_id.into(),
            scopes,
            ttl,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The configured scope universe.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Issue a token. The caller has already authenticated the client.
    pub fn issue(
        &self,
        grant_type: Option<&str>,
        scope: Option<&str>,
    ) -> Result<IssuedToken, IssueError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.issue_at(grant_type, scope, now)
    }

    /// Issue a token as of `now` (seconds since the epoch).
    pub fn issue_at(
        &self,
        grant_type: Option<&str>,
        scope: Option<&str>,
        now: u64,
    ) -> Result<IssuedToken, IssueError> {
        if grant_type != Some(CLIENT_CREDENTIALS) {
            return Err(IssueError::UnsupportedGrantType);
        }

        let granted = self.resolve_scopes(scope.unwrap_or_default())?;
        let scope = join_scopes(&granted);
        let ttl = self.ttl.as_secs();
        let exp = now.checked_add(ttl).ok_or(IssueError::ExpiryOverflow)?;

        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: self.client_id.clone(),
            scope: scope.clone(),
            iat: now,
            exp,
        };
        let access_token = self.keys.sign(&claims).map_err(IssueError::ServerError)?;

        tracing::info!(subject = %claims.sub, %scope, kid = %self.keys.kid(), "Issued access token");

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: ttl,
            scope,
        })
    }

    /// Parse the requested scopes and check them against the universe.
    ///
    /// An empty request grants the whole universe.
    fn resolve_scopes(&self, requested: &str) -> Result<Vec<String>, IssueError> {
        let requested = parse_scopes(requested);
        if requested.is_empty() {
            return Ok(self.scopes.clone());
        }

        let unknown: Vec<String> = requested
            .iter()
            .filter(|s| !self.scopes.contains(s))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(IssueError::InvalidScope { scopes: unknown });
        }
        Ok(requested)
    }
}
