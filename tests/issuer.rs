//! End-to-end tests for the authorization server.
//!
//! Each test binds the issuer on an ephemeral port and talks to it over real
//! HTTP, then verifies the minted tokens against the published key set.

#![cfg(feature = "jwks")]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use mcp_gatekeeper::issuer::{
    AuthorizationServer, AuthorizationServerMetadata, ClientAuthenticator, ClientCredential,
    IssuedToken, KeyManager, TokenIssuer,
};
use mcp_gatekeeper::oauth::{JwtValidator, KeySetDocument, TokenValidator};
use serde_json::{Value, json};

// =============================================================================
// Test fixtures
// =============================================================================

fn keys() -> Arc<KeyManager> {
    static KEYS: OnceLock<Arc<KeyManager>> = OnceLock::new();
    KEYS.get_or_init(|| Arc::new(KeyManager::generate().unwrap()))
        .clone()
}

/// Start an issuer for `c1:s1` with scopes `file.read file.list`.
async fn start_issuer() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let issuer = TokenIssuer::new(
        keys(),
        base.clone(),
        "mcp-server",
        "c1",
        vec!["file.read".to_string(), "file.list".to_string()],
        Duration::from_secs(300),
    );
    let clients = ClientAuthenticator::new(ClientCredential::new("c1", "s1"));
    let server = AuthorizationServer::new(issuer, clients);

    tokio::spawn(async move {
        server.serve_listener(listener).await.unwrap();
    });

    base
}

async fn post_token(base: &str, form: &[(&str, &str)], secret: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/token", base))
        .basic_auth("c1", Some(secret))
        .form(form)
        .send()
        .await
        .unwrap()
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_discovery_points_at_own_endpoints() {
    let base = start_issuer().await;

    let metadata: AuthorizationServerMetadata =
        reqwest::get(format!("{}/.well-known/openid-configuration", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

    assert_eq!(metadata.issuer, base);
    assert_eq!(metadata.token_endpoint, format!("{}/token", base));
    assert_eq!(metadata.jwks_uri, format!("{}/jwks.json", base));
    assert_eq!(metadata.scopes_supported, ["file.read", "file.list"]);
}

#[tokio::test]
async fn test_jwks_publishes_signing_key() {
    let base = start_issuer().await;

    let body: Value = reqwest::get(format!("{}/jwks.json", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let key = &body["keys"][0];
    assert_eq!(body["keys"].as_array().unwrap().len(), 1);
    assert_eq!(key["kty"], "RSA");
    assert_eq!(key["alg"], "RS256");
    assert_eq!(key["use"], "sig");
    assert_eq!(key["kid"], keys().kid());
    assert!(key.get("d").is_none(), "private exponent must not be published");
}

// =============================================================================
// Token grant
// =============================================================================

#[tokio::test]
async fn test_issued_token_verifies_against_published_keys() {
    let base = start_issuer().await;

    let resp = post_token(
        &base,
        &[("grant_type", "client_credentials"), ("scope", "file.read")],
        "s1",
    )
    .await;
    assert_eq!(resp.status(), 200);
    let issued: IssuedToken = resp.json().await.unwrap();
    assert_eq!(issued.token_type, "Bearer");
    assert_eq!(issued.expires_in, 300);
    assert_eq!(issued.scope, "file.read");

    let document: KeySetDocument = reqwest::get(format!("{}/jwks.json", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let validator = JwtValidator::from_document(&document)
        .expected_issuer(base.clone())
        .expected_audience("mcp-server");

    let claims = validator.validate_token(&issued.access_token).await.unwrap();
    assert_eq!(claims.sub.as_deref(), Some("c1"));
    assert_eq!(claims.iss.as_deref(), Some(base.as_str()));
    assert!(claims.has_scope("file.read"));
    assert!(!claims.has_scope("file.list"));
}

#[tokio::test]
async fn test_empty_scope_grants_everything() {
    let base = start_issuer().await;

    let issued: IssuedToken = post_token(&base, &[("grant_type", "client_credentials")], "s1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(issued.scope, "file.read file.list");
}

#[tokio::test]
async fn test_json_body_with_post_credentials() {
    let base = start_issuer().await;

    let resp = reqwest::Client::new()
        .post(format!("{}/token", base))
        .json(&json!({
            "grant_type": "client_credentials",
            "client_id": "c1",
            "client_secret": "s1",
            "scope": "file.list",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let issued: IssuedToken = resp.json().await.unwrap();
    assert_eq!(issued.scope, "file.list");
}

#[tokio::test]
async fn test_error_responses() {
    let base = start_issuer().await;

    let cases: [(&[(&str, &str)], &str, u16, &str); 3] = [
        (&[("grant_type", "client_credentials")], "wrong", 401, "invalid_client"),
        (&[("grant_type", "password")], "s1", 400, "unsupported_grant_type"),
        (
            &[("grant_type", "client_credentials"), ("scope", "file.read admin")],
            "s1",
            400,
            "invalid_scope",
        ),
    ];

    for (form, secret, status, code) in cases {
        let resp = post_token(&base, form, secret).await;
        assert_eq!(resp.status().as_u16(), status, "case {code}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], code);
        assert!(body["error_description"].is_string());
    }
}

#[tokio::test]
async fn test_invalid_scope_lists_offending_scopes() {
    let base = start_issuer().await;

    let body: Value = post_token(
        &base,
        &[("grant_type", "client_credentials"), ("scope", "admin file.read root")],
        "s1",
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(
        body["error_description"],
        "Unsupported scopes requested: admin, root"
    );
}

#[tokio::test]
async fn test_health() {
    let base = start_issuer().await;
    let body: Value = reqwest::get(format!("{}/healthz", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}
