//! Gateway-side authentication errors.
//!
//! Each variant records which admission check failed so it can be logged.
//! The unauthenticated caller only ever sees the status code and a generic
//! reason (see [`OAuthError::public_reason`]).

use std::fmt;

/// Failure to admit a connection, or to verify a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// No bearer token (or API key, in API-key mode) was presented.
    MissingToken,

    /// The token is malformed, has a bad signature, or lacks required claims.
    InvalidToken {
        /// Human-readable description of why the token is invalid.
        description: String,
    },

    /// The token names a key identifier absent from the known key set.
    UnknownKey {
        /// The key identifier from the token header.
        kid: String,
    },

    /// The token's issuer is not the configured one.
    InvalidIssuer,

    /// The token's audience does not match this gateway.
    InvalidAudience,

    /// The token has expired.
    ExpiredToken,

    /// The presented API key does not match.
    InvalidApiKey,

    /// The granted scopes do not cover the required ones.
    InsufficientScope {
        /// Scopes required.
        required: Vec<String>,
        /// Scopes granted by the credential.
        provided: Vec<String>,
    },

    /// The verification keys could not be obtained. This is an internal
    /// failure, not a credential failure.
    KeySetUnavailable {
        /// What went wrong while fetching the key set.
        description: String,
    },
}

impl OAuthError {
    /// Returns the HTTP status code for this error.
    ///
    /// - 500 when verification could not be carried out
    /// - 401 for every credential failure, including missing scopes
    pub fn status_code(&self) -> u16 {
        match self {
            OAuthError::KeySetUnavailable { .. } => 500,
            _ => 401,
        }
    }

    /// The error code from the shared taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::MissingToken | OAuthError::InvalidApiKey => "invalid_client",
            OAuthError::UnknownKey { .. } => "unknown_key",
            OAuthError::InsufficientScope { .. } => "invalid_scope",
            OAuthError::KeySetUnavailable { .. } => "server_error",
            OAuthError::InvalidToken { .. }
            | OAuthError::InvalidIssuer
            | OAuthError::InvalidAudience
            | OAuthError::ExpiredToken => "invalid_token",
        }
    }

    /// The only description an unauthenticated caller receives.
    pub fn public_reason(&self) -> &'static str {
        match self.status_code() {
            500 => "Internal Server Error",
            _ => "Unauthorized",
        }
    }

    /// Whether this is an internal failure rather than a credential failure.
    pub fn is_internal(&self) -> bool {
        self.status_code() == 500
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::MissingToken => write!(f, "missing credential"),
            OAuthError::InvalidToken { description } => {
                write!(f, "invalid token: {}", description)
            }
            OAuthError::UnknownKey { kid } => write!(f, "unknown signing key: {}", kid),
            OAuthError::InvalidIssuer => write!(f, "token issuer does not match"),
            OAuthError::InvalidAudience => write!(f, "token audience does not match"),
            OAuthError::ExpiredToken => write!(f, "token has expired"),
            OAuthError::InvalidApiKey => write!(f, "invalid API key"),
            OAuthError::InsufficientScope { required, provided } => write!(
                f,
                "insufficient scope: required [{}], provided [{}]",
                required.join(", "),
                provided.join(", ")
            ),
            OAuthError::KeySetUnavailable { description } => {
                write!(f, "key set unavailable: {}", description)
            }
        }
    }
}

impl std::error::Error for OAuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_are_401() {
        let errors = [
            OAuthError::MissingToken,
            OAuthError::InvalidToken {
                description: "bad signature".to_string(),
            },
            OAuthError::UnknownKey {
                kid: "k".to_string(),
            },
            OAuthError::InvalidIssuer,
            OAuthError::InvalidAudience,
            OAuthError::ExpiredToken,
            OAuthError::InvalidApiKey,
            OAuthError::InsufficientScope {
                required: vec!["file.list".to_string()],
                provided: vec![],
            },
        ];
        for err in errors {
            assert_eq!(err.status_code(), 401, "{err}");
            assert_eq!(err.public_reason(), "Unauthorized");
            assert!(!err.is_internal());
        }
    }

    #[test]
    fn test_key_set_unavailable_is_500() {
        let err = OAuthError::KeySetUnavailable {
            description: "connection refused".to_string(),
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_reason(), "Internal Server Error");
        assert!(err.is_internal());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OAuthError::ExpiredToken.error_code(), "invalid_token");
        assert_eq!(
            OAuthError::UnknownKey { kid: "x".into() }.error_code(),
            "unknown_key"
        );
        assert_eq!(
            OAuthError::InsufficientScope {
                required: vec![],
                provided: vec![]
            }
            .error_code(),
            "invalid_scope"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(OAuthError::MissingToken.to_string(), "missing credential");
        assert_eq!(OAuthError::ExpiredToken.to_string(), "token has expired");
        assert_eq!(
            OAuthError::UnknownKey { kid: "abc".into() }.to_string(),
            "unknown signing key: abc"
        );
    }
}
