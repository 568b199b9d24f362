//! Error types for mcp-gatekeeper
//!
//! Each component has its own error enum close to the code that raises it
//! ([`IssueError`](crate::issuer::IssueError), [`OAuthError`](crate::oauth::OAuthError),
//! [`SandboxError`](crate::sandbox::SandboxError)). This module holds the
//! crate-level [`Error`] used at process and transport boundaries.

/// Type-erased error used by the binaries and the HTTP plumbing.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// mcp-gatekeeper error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] crate::issuer::KeyError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] crate::sandbox::SandboxError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport(message.into())
    }
}

/// Result type alias for mcp-gatekeeper
pub type Result<T> = std::result::Result<T, Error>;
