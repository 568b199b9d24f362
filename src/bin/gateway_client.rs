//! Demo client for the file gateway
//!
//! Obtains a token from `AUTH_URL` when set (otherwise uses `API_KEY`), then
//! initializes, lists the sandbox root and reads the two sample files.

use clap::Parser;
use mcp_gatekeeper::client::{ClientAuth, GatewayClient, TokenClient};
use mcp_gatekeeper::config::ClientConfig;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), mcp_gatekeeper::BoxError> {
    let config = ClientConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mcp_gateway_client={}", config.log_level).parse()?)
                .add_directive(format!("mcp_gatekeeper={}", config.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let auth = match (&config.auth_url, &config.api_key) {
        (Some(auth_url), _) => {
            let token = TokenClient::new(
                auth_url,
                config.client_id.clone(),
                config.client_secret.expose(),
            )?
            .fetch_token(config.scope.as_deref())
            .await?;
            tracing::info!(
                scope = %token.scope,
                expires_in = token.expires_in,
                "Obtained access token"
            );
            ClientAuth::Bearer(token.access_token)
        }
        (None, Some(key)) => ClientAuth::ApiKey(key.expose().to_string()),
        (None, None) => ClientAuth::None,
    };

    tracing::info!(server_url = %config.server_url, auth = ?auth, "Connecting to gateway");
    let mut client = GatewayClient::connect(&config.server_url, auth).await?;

    let (manifest, server_info) = client.initialize().await?;
    println!(
        "Connected to {} {} ({} tools)",
        server_info.name,
        server_info.version,
        manifest.tools.len()
    );
    println!("{}", serde_json::to_string_pretty(&manifest)?);

    let calls = [
        ("list-files", json!({ "directory": "." })),
        ("read-file", json!({ "filePath": "sample1.txt" })),
        ("read-file", json!({ "filePath": "sample2.txt" })),
    ];
    for (name, arguments) in calls {
        println!("\n=== {} {} ===", name, arguments);
        let result = client.call_tool(name, arguments).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    client.close().await?;
    Ok(())
}
