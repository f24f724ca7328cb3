//! Common test utilities for greenlight integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use greenlight_service::{
    create_router, ActivationNotice, AppState, BoxError, Notifier, RateLimitConfig, ServiceConfig,
};
use greenlight_store::MemoryStore;

/// Default password used by the helpers.
pub const PASSWORD: &str = "pa55word-long";

/// Forwards activation notices to the test instead of logging them.
struct CaptureNotifier {
    tx: mpsc::UnboundedSender<ActivationNotice>,
}

#[async_trait]
impl Notifier for CaptureNotifier {
    async fn send_activation(&self, notice: ActivationNotice) -> Result<(), BoxError> {
        self.tx.send(notice).map_err(|e| e.to_string().into())
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    notices: Mutex<mpsc::UnboundedReceiver<ActivationNotice>>,
}

impl TestHarness {
    /// Create a harness over a fresh in-memory store with rate limiting off.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            environment: "testing".into(),
            rate_limit: RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            },
            ..ServiceConfig::default()
        })
    }

    /// Create a harness with a specific configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::new(Arc::new(MemoryStore::new()), config)
            .with_notifier(Arc::new(CaptureNotifier { tx }));
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            notices: Mutex::new(rx),
        }
    }

    /// Wait for the next activation notice sent in the background.
    pub async fn next_notice(&self) -> ActivationNotice {
        let mut rx = self.notices.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timed out waiting for activation notice")
            .expect("Notifier channel closed")
    }

    /// Register a user and return the response body and activation token.
    pub async fn register(&self, name: &str, email: &str) -> (Value, String) {
        let response = self
            .server
            .post("/v1/users")
            .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
            .await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);

        let notice = self.next_notice().await;
        (response.json(), notice.token)
    }

    /// Activate a user with an activation token.
    pub async fn activate(&self, token: &str) {
        self.server
            .put("/v1/users/activated")
            .json(&json!({ "token": token }))
            .await
            .assert_status_ok();
    }

    /// Log in and return the authentication token plaintext.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .server
            .post("/v1/tokens/authentication")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        body["authentication_token"]["token"]
            .as_str()
            .expect("token in response")
            .to_string()
    }

    /// A request carrying `token` as a bearer token.
    pub fn authed(&self, method: Method, path: &str, token: &str) -> TestRequest {
        let (name, value) = bearer(token);
        self.server.method(method, path).add_header(name, value)
    }

    /// Register, activate and log in a user. Returns the token plaintext.
    pub async fn active_user(&self, email: &str) -> String {
        let (_, activation) = self.register("Test User", email).await;
        self.activate(&activation).await;
        self.login(email).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// `Authorization` header for a bearer token.
pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value"),
    )
}

/// A header with a static name.
pub fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(name),
        HeaderValue::from_str(value).expect("valid header value"),
    )
}
