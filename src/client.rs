//! Clients for the issuer and the gateway.
//!
//! - [`TokenClient`] runs the `client_credentials` grant against the issuer
//! - [`GatewayClient`] connects to the gateway and calls tools
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_gatekeeper::client::{ClientAuth, GatewayClient, TokenClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcp_gatekeeper::BoxError> {
//!     let token = TokenClient::new("http://localhost:8080", "mcp-client", "mcp-client-secret")?
//!         .fetch_token(Some("file.read file.list"))
//!         .await?;
//!
//!     let mut client =
//!         GatewayClient::connect("ws://localhost:3000", ClientAuth::Bearer(token.access_token))
//!             .await?;
//!     let (manifest, _) = client.initialize().await?;
//!     println!("{} tools", manifest.tools.len());
//!
//!     let result = client
//!         .call_tool("read-file", serde_json::json!({"filePath": "sample1.txt"}))
//!         .await?;
//!     println!("{:?}", result);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::auth::API_KEY_HEADER;
use crate::issuer::{CLIENT_CREDENTIALS, ErrorBody, IssuedToken};
use crate::protocol::{ClientMessage, Manifest, ServerInfo, ServerMessage, ToolResult};
use crate::secret::SecretString;

/// Errors raised by the clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token request rejected ({status}): {error}: {description}")]
    Token {
        status: u16,
        error: String,
        description: String,
    },

    #[error("connection rejected with status {status}")]
    Rejected { status: u16 },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid credential header: {0}")]
    InvalidHeader(#[from] tungstenite::http::header::InvalidHeaderValue),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("unexpected message: {0}")]
    Protocol(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,
}

/// Client for the issuer's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl TokenClient {
    /// Create a client for the issuer at `auth_url`.
    pub fn new(
        auth_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            token_url: format!("{}/token", auth_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: SecretString::with_label(client_secret, "CLIENT_SECRET"),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Request a token with HTTP Basic client authentication.
    ///
    /// `None` asks for the issuer's whole scope universe.
    pub async fn fetch_token(&self, scope: Option<&str>) -> Result<IssuedToken, ClientError> {
        let mut form = vec![("grant_type", CLIENT_CREDENTIALS)];
        if let Some(scope) = scope {
            form.push(("scope", scope));
        }

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await?;
        let (error, description) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(body) => (body.error, body.error_description),
            Err(_) => ("unknown".to_string(), body),
        };
        Err(ClientError::Token {
            status: status.as_u16(),
            error,
            description,
        })
    }
}

/// Credential presented on the gateway's upgrade request.
#[derive(Clone, Default)]
pub enum ClientAuth {
    Bearer(String),
    ApiKey(String),
    #[default]
    None,
}

impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientAuth::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            ClientAuth::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            ClientAuth::None => f.write_str("None"),
        }
    }
}

/// WebSocket client for the gateway.
pub struct GatewayClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl GatewayClient {
    /// Connect and pass admission.
    ///
    /// A rejected admission surfaces as [`ClientError::Rejected`] with the
    /// HTTP status (401, or 500 for an internal verification failure).
    pub async fn connect(url: &str, auth: ClientAuth) -> Result<Self, ClientError> {
        let mut request = url.into_client_request()?;
        let headers = request.headers_mut();
        match &auth {
            ClientAuth::Bearer(token) => {
                headers.insert(
                    tungstenite::http::header::AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token))?,
                );
            }
            ClientAuth::ApiKey(key) => {
                headers.insert(API_KEY_HEADER, HeaderValue::from_str(key)?);
            }
            ClientAuth::None => {}
        }

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(response) => ClientError::Rejected {
                    status: response.status().as_u16(),
                },
                other => ClientError::WebSocket(other),
            })?;

        tracing::debug!(%url, "Connected to gateway");
        Ok(Self { stream, next_id: 0 })
    }

    /// Send `initialize` and return the manifest and server info.
    pub async fn initialize(&mut self) -> Result<(Manifest, ServerInfo), ClientError> {
        let id = self.next_id();
        self.send(&ClientMessage::Initialize { id: Some(id) }).await?;
        match self.recv().await? {
            ServerMessage::Initialized {
                manifest,
                server_info,
                ..
            } => Ok((manifest, server_info)),
            ServerMessage::Error { error } => Err(ClientError::Gateway(error)),
            other => Err(ClientError::Protocol(format!("{:?}", other))),
        }
    }

    /// Call a tool and wait for its result.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ClientError> {
        let id = self.next_id();
        self.send(&ClientMessage::ToolCall {
            id: Some(id.clone()),
            name: name.to_string(),
            arguments,
        })
        .await?;

        match self.recv().await? {
            ServerMessage::ToolResult {
                id: Some(reply), result, ..
            } if reply == id => Ok(result),
            ServerMessage::Error { error } => Err(ClientError::Gateway(error)),
            other => Err(ClientError::Protocol(format!("{:?}", other))),
        }
    }

    /// Send a raw frame and return the reply, for protocol-level testing.
    pub async fn request_raw(&mut self, text: &str) -> Result<ServerMessage, ClientError> {
        self.stream.send(Message::text(text)).await?;
        self.recv().await
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }

    fn next_id(&mut self) -> Value {
        self.next_id += 1;
        Value::from(self.next_id)
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = serde_json::to_string(message)?;
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Binary(data) => return Ok(serde_json::from_slice(&data)?),
                Message::Close(_) => return Err(ClientError::Closed),
                _ => continue,
            }
        }
        Err(ClientError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_url() {
        let client = TokenClient::new("http://auth.test/", "c1", "s1").unwrap();
        assert_eq!(client.token_url(), "http://auth.test/token");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let client = TokenClient::new("http://auth.test", "c1", "hunter2").unwrap();
        assert!(!format!("{client:?}").contains("hunter2"));
        assert!(!format!("{:?}", ClientAuth::Bearer("tok".into())).contains("tok"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let err = GatewayClient::connect("ws://127.0.0.1:1", ClientAuth::None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::WebSocket(_)));
    }
}
