//! Movie integration tests.

mod common;

use axum::http::{Method, StatusCode};
use common::{header, TestHarness};
use serde_json::{json, Value};

async fn create_movie(harness: &TestHarness, token: &str, title: &str, year: i32) -> Value {
    let response = harness
        .authed(Method::POST, "/v1/movies", token)
        .json(&json!({
            "title": title,
            "year": year,
            "runtime": "102 mins",
            "genres": ["drama", "romance"]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["movie"].clone()
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn movies_require_a_token() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/movies").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = harness
        .authed(Method::GET, "/v1/movies", "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = harness.authed(Method::GET, "/v1/movies", "short").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inactive_users_are_forbidden() {
    let harness = TestHarness::new();
    harness.register("Alice", "alice@example.com").await;
    let token = harness.login("alice@example.com").await;

    let response = harness.authed(Method::GET, "/v1/movies", &token).await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "inactive_account");
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn create_show_and_delete() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;

    let response = harness
        .authed(Method::POST, "/v1/movies", &token)
        .json(&json!({
            "title": "Casablanca",
            "year": 1942,
            "runtime": "102 mins",
            "genres": ["drama", "romance", "war"]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let id = body["movie"]["id"].as_i64().unwrap();
    assert_eq!(
        response.header("location").to_str().unwrap(),
        format!("/v1/movies/{id}")
    );
    assert_eq!(body["movie"]["version"], 1);
    assert_eq!(body["movie"]["runtime"], "102 mins");

    let response = harness
        .authed(Method::GET, &format!("/v1/movies/{id}"), &token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["movie"]["title"], "Casablanca");

    let response = harness
        .authed(Method::DELETE, &format!("/v1/movies/{id}"), &token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "movie successfully deleted");

    harness
        .authed(Method::GET, &format!("/v1/movies/{id}"), &token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    harness
        .authed(Method::DELETE, &format!("/v1/movies/{id}"), &token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_movie_is_rejected_with_field_errors() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;

    let response = harness
        .authed(Method::POST, "/v1/movies", &token)
        .json(&json!({ "title": "", "year": 1500, "runtime": "90 mins", "genres": [] }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(body["error"]["details"]["title"], "must be provided");
    assert!(body["error"]["details"]["year"].is_string());
    assert!(body["error"]["details"]["genres"].is_string());
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;

    let response = harness
        .authed(Method::POST, "/v1/movies", &token)
        .content_type("application/json")
        .text("{\"title\": ")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = harness
        .authed(Method::POST, "/v1/movies", &token)
        .json(&json!({ "title": "Heat", "year": 1995, "runtime": 170, "genres": ["crime"] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ids_that_are_not_positive_integers_are_not_found() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;

    for path in ["/v1/movies/0", "/v1/movies/-3", "/v1/movies/abc"] {
        harness
            .authed(Method::GET, path, &token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

// ============================================================================
// Optimistic updates
// ============================================================================

#[tokio::test]
async fn partial_update_bumps_version() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;
    let movie = create_movie(&harness, &token, "Casablanca", 1942).await;
    let id = movie["id"].as_i64().unwrap();

    let response = harness
        .authed(Method::PATCH, &format!("/v1/movies/{id}"), &token)
        .json(&json!({ "year": 1943 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["movie"]["year"], 1943);
    assert_eq!(body["movie"]["title"], "Casablanca");
    assert_eq!(body["movie"]["version"], 2);
}

#[tokio::test]
async fn stale_expected_version_conflicts() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;
    let movie = create_movie(&harness, &token, "Casablanca", 1942).await;
    let id = movie["id"].as_i64().unwrap();

    let (name, value) = header("x-expected-version", "1");
    harness
        .authed(Method::PATCH, &format!("/v1/movies/{id}"), &token)
        .add_header(name, value)
        .json(&json!({ "title": "Casablanca (1942)" }))
        .await
        .assert_status_ok();

    let (name, value) = header("x-expected-version", "1");
    let response = harness
        .authed(Method::PATCH, &format!("/v1/movies/{id}"), &token)
        .add_header(name, value)
        .json(&json!({ "title": "Overwritten" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "edit_conflict");

    let body: Value = harness
        .authed(Method::GET, &format!("/v1/movies/{id}"), &token)
        .await
        .json();
    assert_eq!(body["movie"]["title"], "Casablanca (1942)");
    assert_eq!(body["movie"]["version"], 2);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn list_filters_sorts_and_pages() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;
    create_movie(&harness, &token, "Moana", 2016).await;
    create_movie(&harness, &token, "Black Panther", 2018).await;
    create_movie(&harness, &token, "Deadpool", 2016).await;

    let body: Value = harness
        .authed(Method::GET, "/v1/movies?sort=-year&page_size=2", &token)
        .await
        .json();
    let movies = body["movies"].as_array().unwrap();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0]["title"], "Black Panther");
    assert_eq!(body["metadata"]["total_records"], 3);
    assert_eq!(body["metadata"]["last_page"], 2);
    assert_eq!(body["metadata"]["current_page"], 1);

    let body: Value = harness
        .authed(Method::GET, "/v1/movies?title=panther", &token)
        .await
        .json();
    assert_eq!(body["movies"].as_array().unwrap().len(), 1);

    let body: Value = harness
        .authed(Method::GET, "/v1/movies?genres=drama,romance", &token)
        .await
        .json();
    assert_eq!(body["movies"].as_array().unwrap().len(), 3);

    let body: Value = harness
        .authed(Method::GET, "/v1/movies?genres=western", &token)
        .await
        .json();
    assert!(body["movies"].as_array().unwrap().is_empty());
    assert_eq!(body["metadata"], json!({}));
}

#[tokio::test]
async fn list_rejects_bad_parameters() {
    let harness = TestHarness::new();
    let token = harness.active_user("alice@example.com").await;

    let cases = [
        ("/v1/movies?page=0", "page"),
        ("/v1/movies?page=10000001", "page"),
        ("/v1/movies?page=abc", "page"),
        ("/v1/movies?page_size=0", "page_size"),
        ("/v1/movies?page_size=101", "page_size"),
        ("/v1/movies?sort=rating", "sort"),
    ];
    for (path, field) in cases {
        let response = harness.authed(Method::GET, path, &token).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert!(
            body["error"]["details"][field].is_string(),
            "{path} should fail on {field}"
        );
    }

    harness
        .authed(Method::GET, "/v1/movies?page=10000000&page_size=100", &token)
        .await
        .assert_status_ok();
}
