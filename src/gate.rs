//! Connection admission for the gateway.
//!
//! Every inbound connection is checked once, before the WebSocket upgrade and
//! before any protocol message is read. The outcome is a [`GateState`]:
//!
//! ```text
//! Unverified ──► Admitted(AuthorizationContext)
//!            └─► Rejected(OAuthError)
//! ```
//!
//! Both outcomes are terminal. An admitted connection keeps its
//! [`AuthorizationContext`] for its whole lifetime; there is no re-check.
//!
//! [`GateLayer`] applies the gate to an axum router. On success it inserts the
//! context into the request extensions for the upgrade handler. On failure it
//! answers with a bare status and a generic reason; which check failed is only
//! logged.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tower::Layer;

use crate::auth::{ApiKeyValidator, PresentedCredentials};
use crate::oauth::scope::ScopeRequirement;
use crate::oauth::token::token_kid;
use crate::oauth::{OAuthError, TokenValidator};

/// Subject assigned to connections admitted with the shared API key.
pub const API_KEY_SUBJECT: &str = "api-key";

/// How a connection proved its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// A verified access token signed by the key `kid`.
    Bearer { kid: String },
    /// The shared API key.
    ApiKey,
}

/// Verified identity and scopes of an admitted connection.
///
/// Immutable once built; tool handlers consult it read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub subject: String,
    pub scopes: BTreeSet<String>,
    pub method: AuthMethod,
    pub issued_at: Option<u64>,
    pub expires_at: Option<u64>,
}

impl AuthorizationContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Admission state of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Unverified,
    Admitted(AuthorizationContext),
    Rejected(OAuthError),
}

impl GateState {
    /// Apply the outcome of the admission check.
    ///
    /// Only an unverified connection moves; terminal states stay as they are.
    pub fn settle(self, outcome: Result<AuthorizationContext, OAuthError>) -> Self {
        match self {
            GateState::Unverified => match outcome {
                Ok(context) => GateState::Admitted(context),
                Err(error) => GateState::Rejected(error),
            },
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GateState::Unverified)
    }

    pub fn context(&self) -> Option<&AuthorizationContext> {
        match self {
            GateState::Admitted(context) => Some(context),
            _ => None,
        }
    }

    /// The admitted context, or why the connection is not admitted.
    pub fn into_result(self) -> Result<AuthorizationContext, OAuthError> {
        match self {
            GateState::Admitted(context) => Ok(context),
            GateState::Rejected(error) => Err(error),
            GateState::Unverified => Err(OAuthError::MissingToken),
        }
    }
}

/// Which credential the gate accepts.
#[derive(Debug, Clone)]
pub enum GateMode<V> {
    /// OAuth bearer tokens, verified by `validator`. Every connection must
    /// hold the `required` scopes.
    Bearer {
        validator: V,
        required: ScopeRequirement,
    },
    /// A single shared API key. Admitted connections get `scopes`.
    ApiKey {
        validator: ApiKeyValidator,
        scopes: BTreeSet<String>,
    },
}

/// The admission check.
#[derive(Debug, Clone)]
pub struct ConnectionGate<V> {
    mode: GateMode<V>,
}

impl<V: TokenValidator> ConnectionGate<V> {
    pub fn new(mode: GateMode<V>) -> Self {
        Self { mode }
    }

    /// Admit bearer tokens verified by `validator`.
    pub fn bearer(validator: V, required: ScopeRequirement) -> Self {
        Self::new(GateMode::Bearer {
            validator,
            required,
        })
    }

    /// Admit the shared API key, granting `scopes`.
    pub fn api_key(
        validator: ApiKeyValidator,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(GateMode::ApiKey {
            validator,
            scopes: scopes.into_iter().map(Into::into).collect(),
        })
    }

    pub fn mode(&self) -> &GateMode<V> {
        &self.mode
    }

    /// Run the admission check for one connection.
    pub async fn admit(&self, credentials: &PresentedCredentials) -> GateState {
        GateState::Unverified.settle(self.check(credentials).await)
    }

    async fn check(
        &self,
        credentials: &PresentedCredentials,
    ) -> Result<AuthorizationContext, OAuthError> {
        match &self.mode {
            GateMode::Bearer {
                validator,
                required,
            } => {
                let token = credentials
                    .bearer
                    .as_deref()
                    .ok_or(OAuthError::MissingToken)?;
                let claims = validator.validate_token(token).await?;
                let scopes = claims.scopes();
                required.check(&scopes)?;

                Ok(AuthorizationContext {
                    subject: claims.sub.unwrap_or_default(),
                    scopes,
                    method: AuthMethod::Bearer {
                        kid: token_kid(token)?,
                    },
                    issued_at: claims.iat,
                    expires_at: claims.exp,
                })
            }
            GateMode::ApiKey { validator, scopes } => {
                validator.validate(credentials.api_key.as_deref())?;
                Ok(AuthorizationContext {
                    subject: API_KEY_SUBJECT.to_string(),
                    scopes: scopes.clone(),
                    method: AuthMethod::ApiKey,
                    issued_at: None,
                    expires_at: None,
                })
            }
        }
    }
}

/// Tower layer that admits or rejects requests with a [`ConnectionGate`].
///
/// # Example
///
/// ```rust
/// use mcp_gatekeeper::auth::ApiKeyValidator;
/// use mcp_gatekeeper::gate::{ConnectionGate, GateLayer};
/// use mcp_gatekeeper::oauth::JwtValidator;
///
/// let gate: ConnectionGate<JwtValidator> =
///     ConnectionGate::api_key(ApiKeyValidator::new("k3y"), ["file.read"]);
/// let layer = GateLayer::new(gate).public_path("/healthz");
/// ```
#[derive(Clone)]
pub struct GateLayer<V> {
    gate: Arc<ConnectionGate<V>>,
    public_paths: Vec<String>,
}

impl<V: TokenValidator> GateLayer<V> {
    pub fn new(gate: ConnectionGate<V>) -> Self {
        Self {
            gate: Arc::new(gate),
            public_paths: Vec::new(),
        }
    }

    /// Add a path that is served without admission.
    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }
}

impl<S, V: TokenValidator> Layer<S> for GateLayer<V> {
    type Service = GateService<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gate: self.gate.clone(),
            public_paths: self.public_paths.clone(),
        }
    }
}

/// Tower service created by [`GateLayer`].
///
/// For each request:
///
/// 1. Public paths pass straight through
/// 2. Credentials are extracted from the headers and query string
/// 3. [`ConnectionGate::admit`] decides
/// 4. Admitted requests carry the [`AuthorizationContext`] as an extension
/// 5. Rejected requests get a 401 (or 500) with a generic reason
#[derive(Clone)]
pub struct GateService<S, V> {
    inner: S,
    gate: Arc<ConnectionGate<V>>,
    public_paths: Vec<String>,
}

impl<S, V> tower_service::Service<Request<Body>> for GateService<S, V>
where
    S: tower_service::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    V: TokenValidator,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        let is_public = self.public_paths.iter().any(|p| p == req.uri().path());
        // Drive the clone that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if is_public {
                return inner.call(req).await;
            }

            let credentials = PresentedCredentials::from_request_parts(req.headers(), req.uri());
            match gate.admit(&credentials).await {
                GateState::Admitted(context) => {
                    tracing::debug!(subject = %context.subject, scopes = ?context.scopes, "Connection admitted");
                    req.extensions_mut().insert(context);
                    inner.call(req).await
                }
                GateState::Rejected(error) => {
                    tracing::warn!(
                        error = %error,
                        code = error.error_code(),
                        path = %req.uri().path(),
                        "Connection rejected"
                    );
                    Ok(rejection_response(&error))
                }
                GateState::Unverified => Ok(rejection_response(&OAuthError::MissingToken)),
            }
        })
    }
}

/// Bare rejection: status code and generic reason only.
fn rejection_response(error: &OAuthError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
    let mut response = (status, error.public_reason()).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer"),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::test_keys;
    use crate::oauth::JwtValidator;
    use std::convert::Infallible;
    use tower::ServiceExt;
    use tower_service::Service;

    /// Inner service that echoes the admitted subject
    #[derive(Clone)]
    struct EchoSubject;

    impl Service<Request<Body>> for EchoSubject {
        type Response = Response;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Body>) -> Self::Future {
            let subject = req
                .extensions()
                .get::<AuthorizationContext>()
                .map(|c| c.subject.clone())
                .unwrap_or_else(|| "public".to_string());
            Box::pin(async move { Ok(subject.into_response()) })
        }
    }

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn token(scope: &str) -> String {
        let now = now();
        test_keys()
            .sign(&serde_json::json!({
                "iss": "http://auth.test",
                "aud": "mcp-server",
                "sub": "c1",
                "scope": scope,
                "iat": now,
                "exp": now + 300,
            }))
            .unwrap()
    }

    fn bearer_gate() -> ConnectionGate<JwtValidator> {
        let validator = JwtValidator::new(test_keys().verification_keys())
            .expected_issuer("http://auth.test")
            .expected_audience("mcp-server");
        ConnectionGate::bearer(validator, ScopeRequirement::parse("file.read file.list"))
    }

    fn bearer(token: &str) -> PresentedCredentials {
        PresentedCredentials {
            bearer: Some(token.to_string()),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn test_admits_token_with_required_scopes() {
        let state = bearer_gate().admit(&bearer(&token("file.read file.list"))).await;
        let context = state.context().unwrap();
        assert_eq!(context.subject, "c1");
        assert!(context.has_scope("file.list"));
        assert_eq!(
            context.method,
            AuthMethod::Bearer {
                kid: test_keys().kid().to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_extra_scopes_are_fine() {
        let state = bearer_gate()
            .admit(&bearer(&token("file.list admin file.read")))
            .await;
        assert!(matches!(state, GateState::Admitted(_)));
    }

    #[tokio::test]
    async fn test_rejects_missing_scope() {
        let state = bearer_gate().admit(&bearer(&token("file.read"))).await;
        assert!(matches!(
            state,
            GateState::Rejected(OAuthError::InsufficientScope { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_missing_token() {
        let state = bearer_gate().admit(&PresentedCredentials::default()).await;
        assert_eq!(state, GateState::Rejected(OAuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_api_key_is_not_a_bearer_token() {
        let credentials = PresentedCredentials {
            bearer: None,
            api_key: Some("k3y".to_string()),
        };
        let state = bearer_gate().admit(&credentials).await;
        assert_eq!(state, GateState::Rejected(OAuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_api_key_mode() {
        let gate: ConnectionGate<JwtValidator> =
            ConnectionGate::api_key(ApiKeyValidator::new("k3y"), ["file.read"]);

        let good = PresentedCredentials {
            bearer: None,
            api_key: Some("k3y".to_string()),
        };
        let context = gate.admit(&good).await.into_result().unwrap();
        assert_eq!(context.subject, API_KEY_SUBJECT);
        assert_eq!(context.method, AuthMethod::ApiKey);
        assert!(context.has_scope("file.read"));
        assert!(!context.has_scope("file.list"));

        let bad = PresentedCredentials {
            bearer: None,
            api_key: Some("nope".to_string()),
        };
        assert_eq!(
            gate.admit(&bad).await,
            GateState::Rejected(OAuthError::InvalidApiKey)
        );
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let rejected = GateState::Rejected(OAuthError::ExpiredToken);
        let context = AuthorizationContext {
            subject: "c1".into(),
            scopes: BTreeSet::new(),
            method: AuthMethod::ApiKey,
            issued_at: None,
            expires_at: None,
        };
        assert!(rejected.is_terminal());
        assert_eq!(
            rejected.clone().settle(Ok(context)),
            GateState::Rejected(OAuthError::ExpiredToken)
        );
        assert!(!GateState::Unverified.is_terminal());
        assert_eq!(
            GateState::Unverified.into_result(),
            Err(OAuthError::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_layer_rejects_with_generic_reason() {
        let service = GateLayer::new(bearer_gate()).layer(EchoSubject);
        let req = Request::builder()
            .uri("/")
            .header("Authorization", format!("Bearer {}", token("file.read")))
            .body(Body::empty())
            .unwrap();

        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Unauthorized");
    }

    #[tokio::test]
    async fn test_layer_injects_context() {
        let service = GateLayer::new(bearer_gate()).layer(EchoSubject);
        let req = Request::builder()
            .uri("/")
            .header(
                "Authorization",
                format!("Bearer {}", token("file.read file.list")),
            )
            .body(Body::empty())
            .unwrap();

        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"c1");
    }

    #[tokio::test]
    async fn test_public_path_skips_admission() {
        let service = GateLayer::new(bearer_gate())
            .public_path("/healthz")
            .layer(EchoSubject);
        let req = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();

        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
