//! Command-line and environment configuration for the three binaries.
//!
//! Every option is a flag and an environment variable; the environment names
//! match the container deployment (`PORT`, `CLIENT_ID`, `OAUTH_JWKS_URL`, ...).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::issuer::{
    AuthorizationServer, ClientAuthenticator, ClientCredential, KeyManager, TokenIssuer,
};
use crate::oauth::scope::parse_scopes;
use crate::secret::SecretString;

/// Longest accepted `TOKEN_TTL`, one day.
pub const MAX_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Authorization server configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-auth-server", version)]
#[command(about = "OAuth 2.1 client_credentials issuer", long_about = None)]
pub struct IssuerConfig {
    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Issuer URL placed in `iss` and the discovery document [default: http://localhost:PORT]
    #[arg(long, env = "ISSUER")]
    pub issuer: Option<String>,

    /// Audience placed in `aud`
    #[arg(long, env = "AUDIENCE", default_value = "mcp-server")]
    pub audience: String,

    /// Space-separated scope universe
    #[arg(long, env = "ALLOWED_SCOPES", default_value = "file.read file.list")]
    pub allowed_scopes: String,

    /// Token lifetime in seconds, at most one day
    #[arg(long, env = "TOKEN_TTL", default_value_t = 300)]
    pub token_ttl: u64,

    /// Registered client identifier
    #[arg(long, env = "CLIENT_ID", default_value = "mcp-client")]
    pub client_id: String,

    /// Registered client secret
    #[arg(long, env = "CLIENT_SECRET", default_value = "mcp-client-secret", hide_env_values = true)]
    pub client_secret: SecretString,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl IssuerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn issuer_url(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(&self.allowed_scopes)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scopes().is_empty() {
            return Err(Error::config("ALLOWED_SCOPES must name at least one scope"));
        }
        if self.token_ttl == 0 || self.token_ttl > MAX_TOKEN_TTL_SECS {
            return Err(Error::config(format!(
                "TOKEN_TTL must be between 1 and {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(Error::config("CLIENT_ID and CLIENT_SECRET must be set"));
        }
        Ok(())
    }

    /// Generate the signing key and assemble the server.
    pub fn build(&self) -> Result<AuthorizationServer> {
        self.validate()?;
        let keys = Arc::new(KeyManager::generate()?);
        Ok(self.build_with_keys(keys))
    }

    /// Assemble the server around an existing key.
    pub fn build_with_keys(&self, keys: Arc<KeyManager>) -> AuthorizationServer {
        let issuer = TokenIssuer::new(
            keys,
            self.issuer_url(),
            self.audience.clone(),
            self.client_id.clone(),
            self.scopes(),
            Duration::from_secs(self.token_ttl),
        );
        let authenticator = ClientAuthenticator::new(ClientCredential::new(
            self.client_id.clone(),
            self.client_secret.expose(),
        ));
        AuthorizationServer::new(issuer, authenticator)
    }
}

/// Gateway configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-gateway", version)]
#[command(about = "Token-gated MCP file gateway over WebSocket", long_about = None)]
pub struct GatewayConfig {
    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Sandbox root served by the file tools
    #[arg(long, env = "TARGET_DIR", default_value = "/data")]
    pub target_dir: PathBuf,

    /// Issuer key set URL; enables bearer-token mode
    #[arg(long, env = "OAUTH_JWKS_URL")]
    pub oauth_jwks_url: Option<String>,

    /// Required `iss` claim
    #[arg(long, env = "OAUTH_ISSUER")]
    pub oauth_issuer: Option<String>,

    /// Required `aud` claim
    #[arg(long, env = "OAUTH_AUDIENCE")]
    pub oauth_audience: Option<String>,

    /// Space-separated scopes every connection must hold
    #[arg(long, env = "OAUTH_REQUIRED_SCOPES", default_value = "")]
    pub oauth_required_scopes: String,

    /// Seconds before the cached key set is refreshed
    #[arg(long, env = "OAUTH_JWKS_CACHE_TTL", default_value_t = 300)]
    pub oauth_jwks_cache_ttl: u64,

    /// Shared API key; used when no key set URL is configured
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<SecretString>,

    /// Space-separated scopes granted to API-key connections
    #[arg(long, env = "API_KEY_SCOPES", default_value = "file.read file.list")]
    pub api_key_scopes: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// How the gateway admits connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAuth {
    /// Bearer tokens verified against a remote key set.
    Bearer { jwks_url: String },
    /// The shared API key.
    ApiKey,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Select the admission mode. A key set URL wins over an API key.
    pub fn auth(&self) -> Result<GatewayAuth> {
        match (&self.oauth_jwks_url, &self.api_key) {
            (Some(url), _) if !url.is_empty() => Ok(GatewayAuth::Bearer {
                jwks_url: url.clone(),
            }),
            (_, Some(key)) if !key.is_empty() => Ok(GatewayAuth::ApiKey),
            _ => Err(Error::config(
                "no authentication configured: set OAUTH_JWKS_URL or API_KEY",
            )),
        }
    }

    pub fn required_scopes(&self) -> crate::oauth::ScopeRequirement {
        crate::oauth::ScopeRequirement::parse(&self.oauth_required_scopes)
    }

    pub fn sandbox(&self) -> Result<crate::sandbox::PathSandbox> {
        Ok(crate::sandbox::PathSandbox::new(&self.target_dir)?)
    }

    /// Build the connection gate. The key set is fetched on first use.
    #[cfg(feature = "jwks")]
    pub fn gate(&self) -> Result<crate::gate::ConnectionGate<crate::oauth::JwksValidator>> {
        use crate::auth::ApiKeyValidator;
        use crate::gate::ConnectionGate;
        use crate::oauth::JwksValidator;

        match self.auth()? {
            GatewayAuth::Bearer { jwks_url } => {
                let mut builder = JwksValidator::builder(jwks_url)
                    .cache_ttl(Duration::from_secs(self.oauth_jwks_cache_ttl));
                if let Some(issuer) = &self.oauth_issuer {
                    builder = builder.expected_issuer(issuer.clone());
                }
                if let Some(audience) = &self.oauth_audience {
                    builder = builder.expected_audience(audience.clone());
                }
                let validator = builder
                    .build_lazy()
                    .map_err(|e| Error::config(e.to_string()))?;
                Ok(ConnectionGate::bearer(validator, self.required_scopes()))
            }
            GatewayAuth::ApiKey => {
                let key = self
                    .api_key
                    .clone()
                    .ok_or_else(|| Error::config("API_KEY must be set"))?;
                Ok(ConnectionGate::api_key(
                    ApiKeyValidator::from(key),
                    parse_scopes(&self.api_key_scopes),
                ))
            }
        }
    }
}

/// Demo client configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-gateway-client", version)]
#[command(about = "Exercise the file gateway's tools", long_about = None)]
pub struct ClientConfig {
    /// Gateway WebSocket URL
    #[arg(long, env = "SERVER_URL", default_value = "ws://localhost:3000")]
    pub server_url: String,

    /// Shared API key, for gateways in API-key mode
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<SecretString>,

    /// Issuer base URL; when set, a bearer token is fetched first
    #[arg(long, env = "AUTH_URL")]
    pub auth_url: Option<String>,

    /// Client identifier for the token request
    #[arg(long, env = "CLIENT_ID", default_value = "mcp-client")]
    pub client_id: String,

    /// Client secret for the token request
    #[arg(long, env = "CLIENT_SECRET", default_value = "mcp-client-secret", hide_env_values = true)]
    pub client_secret: SecretString,

    /// Scopes to request; empty asks for all
    #[arg(long, env = "SCOPE")]
    pub scope: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}
