//! OAuth 2.1 client_credentials issuer
//!
//! Generates an RSA signing key at startup, publishes it at `/jwks.json`, and
//! mints access tokens for the one registered client at `/token`.

use clap::Parser;
use mcp_gatekeeper::config::IssuerConfig;

#[tokio::main]
async fn main() -> Result<(), mcp_gatekeeper::BoxError> {
    let config = IssuerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mcp_auth_server={}", config.log_level).parse()?)
                .add_directive(format!("mcp_gatekeeper={}", config.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        issuer = %config.issuer_url(),
        audience = %config.audience,
        client_id = %config.client_id,
        scopes = %config.allowed_scopes,
        token_ttl = config.token_ttl,
        "Starting mcp-auth-server"
    );

    let server = config.build()?;
    server.serve(&config.bind_addr()).await?;

    Ok(())
}
