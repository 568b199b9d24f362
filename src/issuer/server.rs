//! HTTP surface of the authorization server.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /.well-known/openid-configuration` | discovery document |
//! | `GET /jwks.json` | public signing key set |
//! | `GET /healthz` | liveness |
//! | `POST /token` | `client_credentials` grant |
//!
//! The token endpoint accepts `application/x-www-form-urlencoded` and JSON
//! bodies. Client authentication is checked before anything else in the
//! request is looked at.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::client::ClientAuthenticator;
use super::metadata::{AuthorizationServerMetadata, JWKS_PATH, TOKEN_PATH, WELL_KNOWN_PATH};
use super::token::{IssueError, TokenIssuer};
use crate::error::{Error, Result};
use crate::oauth::jwk::KeySetDocument;

/// Fields of a token request. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct TokenRequest {
    grant_type: Option<String>,
    scope: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl TokenRequest {
    fn from_form(body: &[u8]) -> Self {
        let mut request = Self::default();
        for (name, value) in url::form_urlencoded::parse(body) {
            let slot = match name.as_ref() {
                "grant_type" => &mut request.grant_type,
                "scope" => &mut request.scope,
                "client_id" => &mut request.client_id,
                "client_secret" => &mut request.client_secret,
                _ => continue,
            };
            // First occurrence wins
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        request
    }

    fn from_json(body: &[u8]) -> std::result::Result<Self, IssueError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| IssueError::InvalidRequest(format!("Malformed JSON body: {e}")))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json")
                || mime.to_ascii_lowercase().ends_with("+json")
        })
}

/// Shared state for the issuer routes
struct IssuerState {
    issuer: TokenIssuer,
    authenticator: ClientAuthenticator,
    metadata: AuthorizationServerMetadata,
    key_set: KeySetDocument,
}

/// The authorization server: discovery, key publication and token issuance.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use mcp_gatekeeper::issuer::{
///     AuthorizationServer, ClientAuthenticator, ClientCredential, KeyManager, TokenIssuer,
/// };
///
/// # async fn example() -> Result<(), mcp_gatekeeper::BoxError> {
/// let keys = Arc::new(KeyManager::generate()?);
/// let issuer = TokenIssuer::new(
///     keys,
///     "http://localhost:8080",
///     "mcp-server",
///     "mcp-client",
///     vec!["file.read".into(), "file.list".into()],
///     Duration::from_secs(300),
/// );
/// let authenticator =
///     ClientAuthenticator::new(ClientCredential::new("mcp-client", "mcp-client-secret"));
///
/// AuthorizationServer::new(issuer, authenticator)
///     .serve("0.0.0.0:8080")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthorizationServer {
    issuer: TokenIssuer,
    authenticator: ClientAuthenticator,
}

impl AuthorizationServer {
    pub fn new(issuer: TokenIssuer, authenticator: ClientAuthenticator) -> Self {
        Self {
            issuer,
            authenticator,
        }
    }

    /// The discovery document this server publishes.
    pub fn metadata(&self) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata::new(self.issuer.issuer()).scopes(self.issuer.scopes().to_vec())
    }

    /// Build the axum router.
    pub fn into_router(self) -> Router {
        let state = Arc::new(IssuerState {
            metadata: self.metadata(),
            key_set: self.issuer.keys().key_set(),
            issuer: self.issuer,
            authenticator: self.authenticator,
        });

        Router::new()
            .route(WELL_KNOWN_PATH, get(handle_discovery))
            .route(JWKS_PATH, get(handle_jwks))
            .route("/healthz", get(handle_health))
            .route(TOKEN_PATH, post(handle_token))
            .with_state(state)
    }

    /// Serve on an already-bound listener.
    pub async fn serve_listener(self, listener: tokio::net::TcpListener) -> Result<()> {
        let issuer = self.issuer.issuer().to_string();
        let audience = self.issuer.audience().to_string();
        let scopes = self.issuer.scopes().join(", ");
        let client_id = self.authenticator.client_id().to_string();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                %addr,
                %issuer,
                %audience,
                allowed_scopes = %scopes,
                %client_id,
                "Authorization server listening"
            );
        }

        axum::serve(listener, self.into_router())
            .await
            .map_err(|e| Error::transport(format!("Server error: {}", e)))
    }

    /// Bind `addr` and serve.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve_listener(listener).await
    }
}

async fn handle_discovery(State(state): State<Arc<IssuerState>>) -> Json<AuthorizationServerMetadata> {
    Json(state.metadata.clone())
}

async fn handle_jwks(State(state): State<Arc<IssuerState>>) -> Json<KeySetDocument> {
    Json(state.key_set.clone())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_token(
    State(state): State<Arc<IssuerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match issue_token(&state, &headers, &body) {
        Ok(token) => Json(token).into_response(),
        Err(err) => {
            tracing::debug!(error = err.error_code(), description = %err, "Token request rejected");
            err.into_response()
        }
    }
}

fn issue_token(
    state: &IssuerState,
    headers: &HeaderMap,
    body: &[u8],
) -> std::result::Result<super::token::IssuedToken, IssueError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    // An unparseable JSON body carries no usable credentials either
    let request = if is_json(headers) {
        match TokenRequest::from_json(body) {
            Ok(request) => request,
            Err(err) if state.authenticator.authenticate(authorization, None, None) => {
                return Err(err);
            }
            Err(_) => return Err(IssueError::InvalidClient),
        }
    } else {
        TokenRequest::from_form(body)
    };

    if !state.authenticator.authenticate(
        authorization,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    ) {
        return Err(IssueError::InvalidClient);
    }

    state
        .issuer
        .issue(request.grant_type.as_deref(), request.scope.as_deref())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use tower::ServiceExt;

    use super::*;
    use crate::issuer::{ClientCredential, shared_test_keys};
    use crate::oauth::{JwtValidator, TokenValidator};

    fn router() -> Router {
        let issuer = TokenIssuer::new(
            shared_test_keys(),
            "http://auth.test",
            "mcp-server",
            "c1",
            vec!["file.read".to_string(), "file.list".to_string()],
            Duration::from_secs(300),
        );
        let authenticator = ClientAuthenticator::new(ClientCredential::new("c1", "s1"));
        AuthorizationServer::new(issuer, authenticator).into_router()
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn form_request(body: &str, basic: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(raw) = basic {
            builder = builder.header("authorization", format!("Basic {}", STANDARD.encode(raw)));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_discovery_document() {
        let request = Request::builder()
            .uri("/.well-known/openid-configuration")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["issuer"], "http://auth.test");
        assert_eq!(json["token_endpoint"], "http://auth.test/token");
        assert_eq!(json["jwks_uri"], "http://auth.test/jwks.json");
        assert_eq!(json["scopes_supported"], serde_json::json!(["file.read", "file.list"]));
    }

    #[tokio::test]
    async fn test_jwks_publishes_active_key() {
        let request = Request::builder().uri("/jwks.json").body(Body::empty()).unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        let keys = json["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["kid"], shared_test_keys().kid());
        assert_eq!(keys[0]["alg"], "RS256");
        assert_eq!(keys[0]["use"], "sig");
        assert!(keys[0].get("d").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_basic_auth_form_grant() {
        let request = form_request(
            "grant_type=client_credentials&scope=file.read+file.list",
            Some("c1:s1"),
        );
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 300);
        assert_eq!(json["scope"], "file.read file.list");

        let validator = JwtValidator::new(shared_test_keys().verification_keys())
            .expected_issuer("http://auth.test")
            .expected_audience("mcp-server");
        let claims = validator
            .validate_token(json["access_token"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(claims.sub.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_post_credentials() {
        let request = form_request(
            "grant_type=client_credentials&client_id=c1&client_secret=s1&scope=file.list",
            None,
        );
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scope"], "file.list");
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"grant_type":"client_credentials","client_id":"c1","client_secret":"s1"}"#,
            ))
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scope"], "file.read file.list");
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/json")
            .header("authorization", format!("Basic {}", STANDARD.encode("c1:s1")))
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_malformed_json_without_credentials_is_invalid_client() {
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "invalid_client");
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let request = form_request("grant_type=client_credentials", Some("c1:wrong"));
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "invalid_client");
        assert_eq!(json["error_description"], "Client authentication failed");
    }

    #[tokio::test]
    async fn test_client_checked_before_grant_type() {
        let request = form_request("grant_type=password", None);
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "invalid_client");
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let request = form_request("grant_type=password", Some("c1:s1"));
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_unknown_scope() {
        let request = form_request(
            "grant_type=client_credentials&scope=unknown.scope",
            Some("c1:s1"),
        );
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_scope");
        assert_eq!(
            json["error_description"],
            "Unsupported scopes requested: unknown.scope"
        );
    }

    #[test]
    fn test_form_first_value_wins() {
        let request = TokenRequest::from_form(b"scope=a&scope=b&grant_type=client_credentials");
        assert_eq!(request.scope.as_deref(), Some("a"));
        assert_eq!(request.grant_type.as_deref(), Some("client_credentials"));
    }

    #[test]
    fn test_json_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(is_json(&headers));
        headers.insert(header::CONTENT_TYPE, "application/x-www-form-urlencoded".parse().unwrap());
        assert!(!is_json(&headers));
    }
}
