//! Token-gated MCP file gateway
//!
//! Admits WebSocket connections holding a bearer token from the issuer (or the
//! shared API key) and serves read-only file tools over `TARGET_DIR`.

use clap::Parser;
use mcp_gatekeeper::config::{GatewayAuth, GatewayConfig};
use mcp_gatekeeper::tool::FileTools;
use mcp_gatekeeper::transport::WebSocketTransport;

#[tokio::main]
async fn main() -> Result<(), mcp_gatekeeper::BoxError> {
    let config = GatewayConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mcp_gateway={}", config.log_level).parse()?)
                .add_directive(format!("mcp_gatekeeper={}", config.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match config.auth()? {
        GatewayAuth::Bearer { jwks_url } => tracing::info!(
            %jwks_url,
            issuer = ?config.oauth_issuer,
            audience = ?config.oauth_audience,
            required_scopes = %config.oauth_required_scopes,
            "Starting mcp-gateway with bearer token authentication"
        ),
        GatewayAuth::ApiKey => tracing::warn!(
            scopes = %config.api_key_scopes,
            "Starting mcp-gateway with API key authentication"
        ),
    }

    let gate = config.gate()?;
    let tools = FileTools::new(config.sandbox()?);

    WebSocketTransport::new(gate, tools)
        .serve(&config.bind_addr())
        .await?;

    Ok(())
}
