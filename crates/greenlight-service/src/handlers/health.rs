//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Deployment details.
    pub system_info: SystemInfo,
}

/// Deployment details reported by the health check.
#[derive(Debug, Serialize)]
pub struct SystemInfo {
    /// Configured environment name.
    pub environment: String,
    /// Service version.
    pub version: String,
}

/// Health check endpoint.
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: state.config.environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    })
}
