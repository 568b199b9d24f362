//! Secret string handling for credentials.
//!
//! [`SecretString`] holds the client secret and the gateway API key. It keeps
//! them out of logs and debug output, and compares them in constant time.
//!
//! # Example
//!
//! ```rust
//! use mcp_gatekeeper::SecretString;
//!
//! let secret = SecretString::with_label("s1", "CLIENT_SECRET");
//! assert_eq!(format!("{:?}", secret), "[CLIENT_SECRET]");
//! assert!(secret.matches("s1"));
//! assert!(!secret.matches("s2"));
//! ```

use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use subtle::ConstantTimeEq;

/// A string wrapper that redacts its contents in Debug and Display output.
///
/// The value is only reachable through [`expose()`](SecretString::expose).
/// Equality, both against another `SecretString` and through
/// [`matches()`](SecretString::matches), does not short-circuit on the first
/// differing byte.
#[derive(Clone)]
pub struct SecretString {
    value: String,
    label: Cow<'static, str>,
}

const DEFAULT_LABEL: &str = "REDACTED";

impl SecretString {
    /// Create a new `SecretString` with the default `[REDACTED]` label.
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            value: s.into(),
            label: Cow::Borrowed(DEFAULT_LABEL),
        }
    }

    /// Create a new `SecretString` with a custom redaction label.
    pub fn with_label(s: impl Into<String>, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            value: s.into(),
            label: label.into(),
        }
    }

    /// Expose the underlying secret value.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Compare a presented credential against this secret in constant time.
    ///
    /// Length differences are still observable; contents are not.
    pub fn matches(&self, presented: &str) -> bool {
        self.value.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    /// Returns the redaction label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true if the secret string is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Debug for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

impl Display for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.value)
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// Lets clap parse secrets straight from flags and environment variables
impl FromStr for SecretString {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let secret = SecretString::new("mcp-client-secret");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_custom_label() {
        let secret = SecretString::with_label("k-123", "API_KEY");
        assert_eq!(format!("{:?}", secret), "[API_KEY]");
        assert_eq!(secret.label(), "API_KEY");
        assert_eq!(secret.expose(), "k-123");
    }

    #[test]
    fn test_matches() {
        let secret = SecretString::new("s1");
        assert!(secret.matches("s1"));
        assert!(!secret.matches("s2"));
        assert!(!secret.matches("s1 "));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_equality_ignores_label() {
        let s1 = SecretString::new("same");
        let s2 = SecretString::with_label("same", "CUSTOM");
        let s3 = SecretString::new("different");
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_from_str_for_clap() {
        let parsed: SecretString = "from-env".parse().unwrap();
        assert_eq!(parsed.expose(), "from-env");
        assert_eq!(parsed.label(), "REDACTED");
    }

    #[test]
    fn test_struct_with_secret_debug() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct Credentials {
            client_id: String,
            client_secret: SecretString,
        }

        let creds = Credentials {
            client_id: "c1".to_string(),
            client_secret: SecretString::with_label("super-secret", "CLIENT_SECRET"),
        };

        let debug_output = format!("{:?}", creds);
        assert!(debug_output.contains("c1"));
        assert!(debug_output.contains("[CLIENT_SECRET]"));
        assert!(!debug_output.contains("super-secret"));
    }
}
