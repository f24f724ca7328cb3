//! User registration, activation and token integration tests.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestHarness, PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn registration_sends_an_activation_notice() {
    let harness = TestHarness::new();

    let (body, token) = harness.register("Alice", "alice@example.com").await;
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["activated"], false);
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(token.len(), 6);
}

#[tokio::test]
async fn registration_validates_input() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users")
        .json(&json!({ "name": "", "email": "not-an-email", "password": "short" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    let details = &body["error"]["details"];
    assert_eq!(details["name"], "must be provided");
    assert_eq!(details["email"], "must be a valid email address");
    assert_eq!(details["password"], "must be at least 8 bytes long");
}

#[tokio::test]
async fn duplicate_email_is_rejected_ignoring_case() {
    let harness = TestHarness::new();
    harness.register("Alice", "alice@example.com").await;

    let response = harness
        .server
        .post("/v1/users")
        .json(&json!({ "name": "Alice", "email": "ALICE@example.com", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(
        body["error"]["details"]["email"],
        "a user with this email address already exists"
    );
}

#[tokio::test]
async fn activation_token_works_once() {
    let harness = TestHarness::new();
    let (_, token) = harness.register("Alice", "alice@example.com").await;

    let response = harness
        .server
        .put("/v1/users/activated")
        .json(&json!({ "token": token }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user"]["activated"], true);

    let response = harness
        .server
        .put("/v1/users/activated")
        .json(&json!({ "token": token }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(
        body["error"]["details"]["token"],
        "invalid or expired activation token"
    );
}

#[tokio::test]
async fn activation_token_must_have_the_right_length() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .put("/v1/users/activated")
        .json(&json!({ "token": "ABC" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["details"]["token"], "must be 6 characters long");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let harness = TestHarness::new();
    harness.register("Alice", "alice@example.com").await;

    for email in ["alice@example.com", "nobody@example.com"] {
        let response = harness
            .server
            .post("/v1/tokens/authentication")
            .json(&json!({ "email": email, "password": "wrong-password" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "invalid_credentials");
    }
}

#[tokio::test]
async fn new_login_revokes_older_tokens() {
    let harness = TestHarness::new();
    let first = harness.active_user("alice@example.com").await;
    assert_eq!(first.len(), 32);

    harness
        .authed(Method::GET, "/v1/movies", &first)
        .await
        .assert_status_ok();

    let second = harness.login("alice@example.com").await;
    assert_ne!(first, second);

    harness
        .authed(Method::GET, "/v1/movies", &first)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    harness
        .authed(Method::GET, "/v1/movies", &second)
        .await
        .assert_status_ok();
}
