//! OAuth scope parsing and scope requirements.
//!
//! Scopes travel as space-delimited strings (RFC 6749 Section 3.3). The issuer
//! uses [`parse_scopes`] on the requested `scope` parameter. The gateway uses
//! [`ScopeRequirement`] for the scopes every connection must hold, and
//! [`ScopePolicy`] for the extra scopes a single tool needs.

use std::collections::{BTreeSet, HashMap};

use super::error::OAuthError;

/// Split a scope string on whitespace, keeping first-seen order and dropping
/// duplicates.
///
/// ```rust
/// use mcp_gatekeeper::oauth::scope::parse_scopes;
///
/// assert_eq!(parse_scopes(" file.read  file.list file.read"), vec!["file.read", "file.list"]);
/// assert!(parse_scopes("   ").is_empty());
/// ```
pub fn parse_scopes(scope: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    scope
        .split_whitespace()
        .filter(|s| seen.insert(*s))
        .map(String::from)
        .collect()
}

/// Join scopes back into their wire form.
pub fn join_scopes<S: AsRef<str>>(scopes: &[S]) -> String {
    scopes
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A set of required OAuth scopes.
///
/// All scopes in the requirement must be granted (AND semantics). An empty
/// requirement is always satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRequirement {
    required: BTreeSet<String>,
}

impl ScopeRequirement {
    /// Create an empty scope requirement (no scopes needed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope requirement from a single scope.
    pub fn one(scope: impl Into<String>) -> Self {
        Self::new().require(scope)
    }

    /// Create a scope requirement from multiple scopes.
    pub fn all(scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a requirement from a space-delimited scope string.
    pub fn parse(scope: &str) -> Self {
        Self::all(parse_scopes(scope))
    }

    /// Add a required scope to this requirement.
    pub fn require(mut self, scope: impl Into<String>) -> Self {
        self.required.insert(scope.into());
        self
    }

    /// Check a granted scope set against this requirement.
    ///
    /// Extra granted scopes are fine; every required one must be present.
    pub fn check(&self, granted: &BTreeSet<String>) -> Result<(), OAuthError> {
        if self.required.is_subset(granted) {
            Ok(())
        } else {
            Err(OAuthError::InsufficientScope {
                required: self.required.iter().cloned().collect(),
                provided: granted.iter().cloned().collect(),
            })
        }
    }

    /// Returns the required scopes.
    pub fn required_scopes(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Returns true if no scopes are required.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}

/// Per-tool scope requirements, checked after admission.
///
/// # Example
///
/// ```rust
/// use mcp_gatekeeper::oauth::ScopePolicy;
///
/// let policy = ScopePolicy::new()
///     .tool_scope("list-files", "file.list")
///     .tool_scope("read-file", "file.read");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopePolicy {
    tool_scopes: HashMap<String, ScopeRequirement>,
}

impl ScopePolicy {
    /// Create an empty scope policy (no per-tool scopes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `scope` for calls to `tool_name`.
    pub fn tool_scope(mut self, tool_name: impl Into<String>, scope: impl Into<String>) -> Self {
        let entry = self.tool_scopes.entry(tool_name.into()).or_default();
        entry.required.insert(scope.into());
        self
    }

    /// Check the granted scopes against a tool's requirement.
    ///
    /// Tools without an entry need no extra scope.
    pub fn check_tool(&self, tool_name: &str, granted: &BTreeSet<String>) -> Result<(), OAuthError> {
        match self.tool_scopes.get(tool_name) {
            Some(requirement) => requirement.check(granted),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granted(scopes: &str) -> BTreeSet<String> {
        parse_scopes(scopes).into_iter().collect()
    }

    #[test]
    fn test_parse_preserves_order_and_dedups() {
        assert_eq!(
            parse_scopes("file.list\tfile.read\nfile.list"),
            vec!["file.list", "file.read"]
        );
        assert!(parse_scopes("").is_empty());
    }

    #[test]
    fn test_join() {
        assert_eq!(join_scopes(&["file.read", "file.list"]), "file.read file.list");
        assert_eq!(join_scopes::<&str>(&[]), "");
    }

    #[test]
    fn test_empty_requirement_always_passes() {
        let req = ScopeRequirement::new();
        assert!(req.is_empty());
        assert!(req.check(&BTreeSet::new()).is_ok());
    }

    #[test]
    fn test_requirement_subset() {
        let req = ScopeRequirement::parse("file.read file.list");
        assert!(req.check(&granted("file.read file.list")).is_ok());
        assert!(req.check(&granted("file.list file.read admin")).is_ok());
    }

    #[test]
    fn test_requirement_missing_scope() {
        let req = ScopeRequirement::parse("file.read file.list");
        let err = req.check(&granted("file.read")).unwrap_err();
        match err {
            OAuthError::InsufficientScope { required, provided } => {
                assert_eq!(required, vec!["file.list", "file.read"]);
                assert_eq!(provided, vec!["file.read"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_policy_per_tool() {
        let policy = ScopePolicy::new()
            .tool_scope("list-files", "file.list")
            .tool_scope("read-file", "file.read");

        let read_only = granted("file.read");
        assert!(policy.check_tool("read-file", &read_only).is_ok());
        assert!(policy.check_tool("list-files", &read_only).is_err());
        assert!(policy.check_tool("unregistered", &read_only).is_ok());
    }
}
