//! Shared harness for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use funpdbe_api::{
    create_api_router, ApiConfig, AppComponents, AuthConfig, Claims, DepositionService,
};
use funpdbe_core::{AuthorizationGate, ResourceRegistry};
use funpdbe_storage::InMemoryStore;
use funpdbe_test_utils::mock_directory;
use serde_json::Value;
use tower::ServiceExt;

pub const ALICE_KEY: &str = "alice_key_0001";
pub const BOB_KEY: &str = "bob_key_0002";
pub const CAROL_KEY: &str = "carol_key_0003";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub auth: AuthConfig,
}

pub fn auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.add_api_key(ALICE_KEY, "alice");
    config.add_api_key(BOB_KEY, "bob");
    // carol has a key but no memberships
    config.add_api_key(CAROL_KEY, "carol");
    config
}

/// Router over an in-memory store with resources funsites, nod and cath.
pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(mock_directory());
    let registry = Arc::new(ResourceRegistry::from_list("funsites, nod, cath"));

    let gate = AuthorizationGate::new(registry, directory.clone());
    let service = Arc::new(DepositionService::new(store.clone(), gate));
    let auth = auth_config();

    let router = create_api_router(
        AppComponents::new(service, directory),
        &ApiConfig::default(),
        auth.clone(),
    )
    .expect("router builds outside production");

    TestApp {
        router,
        store,
        auth,
    }
}

/// A bearer token for `principal`, signed with the app's key and valid for an hour.
pub fn sign_token(auth: &AuthConfig, principal: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: principal.to_string(),
        iat: now,
        exp: now + 3600,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(auth.jwt_algorithm),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(auth.jwt_secret.expose().as_bytes()),
    )
    .expect("token signs")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `code` of an error body.
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse { status, body }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

pub async fn post_json(router: &Router, uri: &str, api_key: Option<&str>, body: &Value) -> TestResponse {
    post_raw(router, uri, api_key, body.to_string()).await
}

pub async fn post_raw(
    router: &Router,
    uri: &str,
    api_key: Option<&str>,
    body: impl Into<String>,
) -> TestResponse {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    send(router, builder.body(Body::from(body.into())).unwrap()).await
}

pub async fn delete(router: &Router, uri: &str, api_key: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    send(router, builder.body(Body::empty()).unwrap()).await
}
