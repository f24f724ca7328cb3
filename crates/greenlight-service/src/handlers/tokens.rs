//! Authentication token handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use greenlight_core::{
    validate_email, validate_password_plaintext, verify_password, Token, TokenScope, Validator,
};
use greenlight_store::StoreError;

use crate::error::ApiError;
use crate::handlers::json_body;
use crate::state::AppState;

/// Login request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTokenRequest {
    /// Email address.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Issued token envelope.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Token plaintext and expiry.
    pub authentication_token: Token,
}

/// Exchange credentials for an authentication token. Earlier authentication
/// tokens of the same user stop working.
pub async fn create_authentication_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let input = json_body(payload)?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    v.finish()?;

    let user = match state.store.get_user_by_email(&input.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    let password = input.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    if !matches {
        tracing::warn!(user_id = user.id, "Failed login");
        return Err(ApiError::InvalidCredentials);
    }

    state
        .store
        .delete_all_for_user(TokenScope::Authentication, user.id)
        .await?;
    let token = state
        .store
        .new_token(
            user.id,
            chrono::Duration::hours(state.config.auth_token_ttl_hours),
            TokenScope::Authentication,
        )
        .await?;

    tracing::info!(user_id = user.id, "Authentication token issued");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            authentication_token: token,
        }),
    ))
}
