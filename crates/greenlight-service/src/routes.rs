//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{categories, health, items, movies, tokens, users};
use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Maximum concurrent requests across the API.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /v1/healthcheck` - Health check
///
/// ## Movies (activated user)
/// - `GET|POST /v1/movies` - List / create
/// - `GET|PATCH|DELETE /v1/movies/:id` - Show / update / delete
///
/// ## Categories
/// - `GET|POST /v1/categories` - List / create
/// - `GET|DELETE /v1/categories/:id` - Show / delete
/// - `POST|PUT /v1/categories/:id/translations` - Add / update a language
///
/// ## Items
/// - `GET|POST /v1/items` - List / create
/// - `GET|PUT|DELETE /v1/items/:id` - Show / upsert translation / delete
/// - `GET /v1/items/untranslated/:lang` - Items missing a language
///
/// ## Accounts
/// - `POST /v1/users` - Register
/// - `PUT /v1/users/activated` - Activate
/// - `POST /v1/tokens/authentication` - Log in
///
/// Every route is rate limited per client.
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/healthcheck", get(health::healthcheck))
        // Movies
        .route(
            "/movies",
            get(movies::list_movies).post(movies::create_movie),
        )
        .route(
            "/movies/:id",
            get(movies::show_movie)
                .patch(movies::update_movie)
                .delete(movies::delete_movie),
        )
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::show_category).delete(categories::delete_category),
        )
        .route(
            "/categories/:id/translations",
            post(categories::add_category_translation)
                .put(categories::update_category_translation),
        )
        // Items
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::show_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route(
            "/items/untranslated/:lang",
            get(items::list_untranslated_items),
        )
        // Accounts
        .route("/users", post(users::register_user))
        .route("/users/activated", put(users::activate_user))
        .route(
            "/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit_middleware,
        ))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .nest("/v1", api_routes)
        // Global middleware
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any)
    }
}

/// Turn a handler panic into the usual 500 body. The panic message is
/// logged, never returned.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
