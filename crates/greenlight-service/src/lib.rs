//! Greenlight HTTP API service.
//!
//! This crate provides the HTTP API for greenlight:
//!
//! - Movies with optimistic concurrency
//! - Categories and items with per-language translations
//! - User registration, activation and token authentication
//! - Per-client rate limiting
//!
//! # Authentication
//!
//! Movie routes take `Authorization: Bearer <token>` where the token comes
//! from `POST /v1/tokens/authentication`, and the account must be activated.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Health check needs async for the router

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use background::{BackgroundRunner, BoxError};
pub use config::{RateLimitConfig, ServiceConfig};
pub use error::ApiError;
pub use notify::{ActivationNotice, LogNotifier, Notifier};
pub use rate_limit::RateLimiter;
pub use routes::create_router;
pub use state::AppState;
