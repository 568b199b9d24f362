//! WebSocket transport for the file gateway.
//!
//! Admission happens in [`GateLayer`] before the upgrade, so a rejected client
//! never reaches the session loop and never sees a protocol message. Each
//! admitted connection gets its own session holding the immutable
//! [`AuthorizationContext`].
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_gatekeeper::auth::ApiKeyValidator;
//! use mcp_gatekeeper::gate::ConnectionGate;
//! use mcp_gatekeeper::oauth::JwtValidator;
//! use mcp_gatekeeper::sandbox::PathSandbox;
//! use mcp_gatekeeper::tool::FileTools;
//! use mcp_gatekeeper::transport::WebSocketTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcp_gatekeeper::BoxError> {
//!     let gate: ConnectionGate<JwtValidator> =
//!         ConnectionGate::api_key(ApiKeyValidator::new("k3y"), ["file.read", "file.list"]);
//!     let tools = FileTools::new(PathSandbox::new("/data")?);
//!
//!     WebSocketTransport::new(gate, tools).serve("127.0.0.1:3000").await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};

use crate::error::{Error, Result};
use crate::gate::{AuthorizationContext, ConnectionGate, GateLayer};
use crate::oauth::TokenValidator;
use crate::protocol::{ClientMessage, Manifest, ServerInfo, ServerMessage};
use crate::tool::{self, FileTools};

/// Path of the unauthenticated liveness probe.
pub const HEALTH_PATH: &str = "/healthz";

/// Session state for one admitted connection, owned by its socket task
#[derive(Debug)]
struct Session {
    id: String,
    context: AuthorizationContext,
}

impl Session {
    fn new(context: AuthorizationContext) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            context,
        }
    }
}

/// Shared state for the gateway routes
struct AppState {
    tools: FileTools,
    manifest: Manifest,
}

/// WebSocket transport for the file gateway.
pub struct WebSocketTransport<V> {
    gate: ConnectionGate<V>,
    tools: FileTools,
}

impl<V: TokenValidator> WebSocketTransport<V> {
    pub fn new(gate: ConnectionGate<V>, tools: FileTools) -> Self {
        Self { gate, tools }
    }

    /// Build the axum router: `/` behind the gate, `/healthz` public.
    pub fn into_router(self) -> Router {
        let state = Arc::new(AppState {
            tools: self.tools,
            manifest: tool::manifest(),
        });

        Router::new()
            .route("/", get(handle_websocket))
            .route(HEALTH_PATH, get(handle_health))
            .with_state(state)
            .layer(GateLayer::new(self.gate).public_path(HEALTH_PATH))
    }

    /// Serve on an already-bound listener.
    pub async fn serve_listener(self, listener: tokio::net::TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                %addr,
                root = %self.tools.sandbox().root().display(),
                "MCP gateway listening"
            );
        }

        axum::serve(listener, self.into_router())
            .await
            .map_err(|e| Error::Transport(format!("Server error: {}", e)))
    }

    /// Serve the transport on the given address
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve_listener(listener).await
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Handle WebSocket upgrade for an admitted request
async fn handle_websocket(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<AuthorizationContext>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, context))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, context: AuthorizationContext) {
    let session = Session::new(context);
    let session_id = session.id.as_str();

    tracing::info!(
        session_id = %session_id,
        subject = %session.context.subject,
        "WebSocket connection established"
    );

    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        let response = match msg {
            Message::Text(text) => dispatch(&state, &session, text.as_str()).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => dispatch(&state, &session, text).await,
                Err(_) => ServerMessage::error("Binary frame is not valid UTF-8"),
            },
            Message::Ping(data) => {
                if let Err(e) = sender.send(Message::Pong(data)).await {
                    tracing::error!(error = %e, "Failed to send pong");
                    break;
                }
                continue;
            }
            Message::Pong(_) => continue,
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket close received");
                break;
            }
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                continue;
            }
        };

        if let Err(e) = sender.send(Message::Text(response_json.into())).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to send response");
            break;
        }
    }

    tracing::info!(session_id = %session_id, "WebSocket connection closed");
}

/// Turn one client frame into exactly one reply
async fn dispatch(state: &AppState, session: &Session, text: &str) -> ServerMessage {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(session_id = %session.id, error = %e, "Malformed message");
            return ServerMessage::error(e.to_string());
        }
    };

    match message {
        ClientMessage::Initialize { id } => ServerMessage::Initialized {
            id,
            manifest: state.manifest.clone(),
            server_info: ServerInfo::default(),
        },
        ClientMessage::ToolCall {
            id,
            name,
            arguments,
        } => {
            tracing::debug!(session_id = %session.id, tool = %name, "Tool call");
            let result = state.tools.call(&name, arguments, &session.context).await;
            ServerMessage::ToolResult { id, result }
        }
        ClientMessage::Unknown { kind } => {
            ServerMessage::error(format!("Unknown message type: {}", kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::ApiKeyValidator;
    use crate::gate::AuthMethod;
    use crate::oauth::JwtValidator;
    use crate::protocol::ToolResult;
    use crate::sandbox::PathSandbox;

    fn transport(dir: &tempfile::TempDir) -> WebSocketTransport<JwtValidator> {
        let gate = ConnectionGate::api_key(ApiKeyValidator::new("k3y"), ["file.read"]);
        WebSocketTransport::new(gate, FileTools::new(PathSandbox::new(dir.path()).unwrap()))
    }

    fn state(dir: &tempfile::TempDir) -> AppState {
        AppState {
            tools: FileTools::new(PathSandbox::new(dir.path()).unwrap()),
            manifest: tool::manifest(),
        }
    }

    fn session(scopes: &[&str]) -> Session {
        Session::new(AuthorizationContext {
            subject: "c1".into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            method: AuthMethod::ApiKey,
            issued_at: None,
            expires_at: None,
        })
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let dir = tempfile::tempdir().unwrap();
        let router = transport(&dir).into_router();
        let resp = router
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_root_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let router = transport(&dir).into_router();
        let resp = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_dispatch_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let reply = dispatch(&state(&dir), &session(&[]), r#"{"type":"initialize","id":1}"#).await;
        match reply {
            ServerMessage::Initialized {
                id,
                manifest,
                server_info,
            } => {
                assert_eq!(id, Some(json!(1)));
                assert_eq!(manifest.tools.len(), 2);
                assert_eq!(server_info.name, "file-operations-mcp");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let session = session(&[]);

        assert_eq!(
            dispatch(&state, &session, r#"{"type":"subscribe"}"#).await,
            ServerMessage::error("Unknown message type: subscribe")
        );
        assert!(matches!(
            dispatch(&state, &session, "not json").await,
            ServerMessage::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_tool_call() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();

        let reply = dispatch(
            &state(&dir),
            &session(&["file.read"]),
            r#"{"type":"tool_call","id":7,"name":"read-file","arguments":{"filePath":"a.txt"}}"#,
        )
        .await;
        assert_eq!(
            reply,
            ServerMessage::ToolResult {
                id: Some(json!(7)),
                result: ToolResult::content("alpha".into(), "a.txt"),
            }
        );
    }

    #[test]
    fn test_each_session_gets_its_own_id() {
        let a = session(&["file.read"]);
        let b = session(&["file.read"]);
        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
        assert!(a.context.has_scope("file.read"));
    }
}
