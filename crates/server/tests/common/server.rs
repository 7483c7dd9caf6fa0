//! Server test utilities.

use crate::common::fixtures::{trust, users};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gatehouse_core::config::AppConfig;
use gatehouse_server::{AppState, create_router};
use gatehouse_storage::MemoryBackend;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with in-memory storage and the fixture principals.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        config.auth.users = users();
        config.trust = trust();
        modifier(&mut config);

        let state = AppState::new(config, Arc::new(MemoryBackend::new()))
            .expect("Failed to build application state");
        let router = create_router(state.clone());

        Self { router, state }
    }

    /// Send a JSON request and parse the JSON response.
    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self
            .raw_request(
                method,
                uri,
                body.map(|v| serde_json::to_vec(&v).unwrap()),
                auth_token,
            )
            .await;

        let json: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Send a request with a raw body and return the raw response body.
    pub async fn raw_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Vec<u8>>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let body = match body {
            Some(bytes) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    /// Register host-info and return its id.
    pub async fn register_host_info(&self) -> i64 {
        let (status, body) = self
            .json_request(
                "POST",
                "/register-category",
                Some(crate::common::fixtures::host_info_registration()),
                Some(crate::common::fixtures::ADMIN_TOKEN),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["categoryId"].as_i64().unwrap()
    }

    /// Prepare a descriptor and return the whole response body.
    pub async fn prepare(&self, category_id: i64, descriptor: &str, token: &str) -> Value {
        let (status, body) = self
            .json_request(
                "POST",
                "/prepare-statement",
                Some(serde_json::json!({"categoryId": category_id, "descriptor": descriptor})),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}
