//! # mcp-gatekeeper
//!
//! An OAuth 2.1 `client_credentials` authorization server and a token-gated
//! MCP file gateway, built on [axum](https://docs.rs/axum) and
//! [Tower](https://docs.rs/tower).
//!
//! ## Components
//!
//! - **Issuer** ([`issuer::AuthorizationServer`]): authenticates one
//!   registered client, mints short-lived RS256 access tokens, and publishes
//!   its public key as a JSON Web Key Set plus a discovery document.
//!
//! - **Gateway** ([`transport::WebSocketTransport`]): admits WebSocket
//!   connections that present a valid bearer token (verified against the
//!   issuer's key set) or the shared API key, then serves `list-files` and
//!   `read-file` over a small JSON message protocol.
//!
//! - **Sandbox** ([`sandbox::PathSandbox`]): every path a tool touches is
//!   resolved against one root directory; anything outside it is refused.
//!
//! ## Quick Start: Issuer
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mcp_gatekeeper::BoxError;
//! use mcp_gatekeeper::issuer::{
//!     AuthorizationServer, ClientAuthenticator, ClientCredential, KeyManager, TokenIssuer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let keys = Arc::new(KeyManager::generate()?);
//!     let issuer = TokenIssuer::new(
//!         keys,
//!         "http://localhost:8080",
//!         "mcp-server",
//!         "mcp-client",
//!         vec!["file.read".into(), "file.list".into()],
//!         Duration::from_secs(300),
//!     );
//!     let clients = ClientAuthenticator::new(ClientCredential::new("mcp-client", "s3cret"));
//!
//!     AuthorizationServer::new(issuer, clients).serve("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start: Gateway
//!
//! ```rust,no_run
//! use mcp_gatekeeper::BoxError;
//! use mcp_gatekeeper::gate::ConnectionGate;
//! use mcp_gatekeeper::oauth::{JwksValidator, ScopeRequirement};
//! use mcp_gatekeeper::sandbox::PathSandbox;
//! use mcp_gatekeeper::tool::FileTools;
//! use mcp_gatekeeper::transport::WebSocketTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let validator = JwksValidator::builder("http://localhost:8080/jwks.json")
//!         .expected_issuer("http://localhost:8080")
//!         .expected_audience("mcp-server")
//!         .build_lazy()?;
//!     let gate = ConnectionGate::bearer(validator, ScopeRequirement::new());
//!     let tools = FileTools::new(PathSandbox::new("/data")?);
//!
//!     WebSocketTransport::new(gate, tools).serve("0.0.0.0:3000").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `jwks` - Remote key set fetching for the gateway (enabled by default)
//! - `client` - Token and WebSocket clients (enabled by default)

pub mod auth;
#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod issuer;
pub mod oauth;
pub mod protocol;
pub mod sandbox;
pub mod secret;
pub mod tool;
pub mod transport;

// Re-exports
pub use auth::{ApiKeyValidator, PresentedCredentials};
pub use error::{BoxError, Error, Result};
pub use gate::{AuthorizationContext, ConnectionGate, GateLayer};
pub use issuer::{AuthorizationServer, TokenIssuer};
pub use protocol::{ClientMessage, ServerMessage, ToolResult};
pub use sandbox::PathSandbox;
pub use secret::SecretString;
pub use tool::FileTools;
pub use transport::WebSocketTransport;

#[cfg(feature = "jwks")]
pub use oauth::JwksValidator;

#[cfg(feature = "client")]
pub use client::{GatewayClient, TokenClient};
