//! OAuth 2.1 resource server support for the gateway.
//!
//! The gateway is a **resource server**: it verifies RS256 access tokens
//! minted by the issuer and enforces scopes on connections and tool calls.
//!
//! # Architecture
//!
//! - **Key sets** ([`KeySet`], [`KeySetDocument`]): RSA public keys indexed by
//!   `kid`, in the JSON Web Key Set format the issuer publishes.
//!
//! - **Token validation** ([`TokenValidator`]): Pluggable trait for verifying
//!   access tokens. [`JwtValidator`] checks against a fixed key set;
//!   `JwksValidator` (feature `jwks`) fetches the issuer's key set, caches it,
//!   and refreshes it when an unknown `kid` shows up.
//!
//! - **Scopes** ([`ScopeRequirement`], [`ScopePolicy`]): Scopes every
//!   connection must hold, and the scope each tool needs on top.
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_gatekeeper::oauth::{JwksValidator, TokenValidator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcp_gatekeeper::BoxError> {
//!     let validator = JwksValidator::builder("http://localhost:8080/jwks.json")
//!         .expected_issuer("http://localhost:8080")
//!         .expected_audience("mcp-server")
//!         .build()
//!         .await?;
//!
//!     let claims = validator.validate_token("eyJ...").await?;
//!     println!("subject: {:?}, scopes: {:?}", claims.sub, claims.scopes());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod jwk;
#[cfg(feature = "jwks")]
pub mod jwks;
pub mod scope;
pub mod token;

pub use error::OAuthError;
pub use jwk::{KeyDescriptor, KeySet, KeySetDocument, SIGNING_ALGORITHM};
#[cfg(feature = "jwks")]
pub use jwks::{JwksError, JwksValidator, JwksValidatorBuilder};
pub use scope::{ScopePolicy, ScopeRequirement};
pub use token::{ExpectedClaims, JwtValidator, TokenAudience, TokenClaims, TokenValidator};
