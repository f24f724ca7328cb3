//! User registration and activation handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use greenlight_core::{
    hash_password, validate_password_plaintext, validate_token_plaintext, NewUser, TokenScope,
    User, Validator,
};
use greenlight_store::StoreError;

use crate::error::ApiError;
use crate::handlers::json_body;
use crate::notify::ActivationNotice;
use crate::state::AppState;

/// Single user envelope.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// The user.
    pub user: User,
}

/// Registration request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterUserRequest {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Activation request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActivateUserRequest {
    /// Activation token plaintext.
    pub token: String,
}

/// Register a user and send the activation notice in the background.
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let input = json_body(payload)?;

    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &input.password);
    let mut new_user = NewUser {
        name: input.name,
        email: input.email,
        password_hash: String::new(),
    };
    new_user.validate(&mut v);
    v.finish()?;

    // Argon2 is CPU bound; keep it off the async workers.
    let password = input.password;
    new_user.password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    let user = state.store.insert_user(&new_user).await?;

    let token = state
        .store
        .new_token(
            user.id,
            chrono::Duration::hours(state.config.activation_token_ttl_hours),
            TokenScope::Activation,
        )
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    let notice = ActivationNotice {
        user_id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        token: token.plaintext,
    };
    let notifier = Arc::clone(&state.notifier);
    state.background.run("activation_notice", async move {
        notifier.send_activation(notice).await
    });

    Ok((StatusCode::ACCEPTED, Json(UserResponse { user })))
}

/// Activate the owner of an activation token.
pub async fn activate_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActivateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let input = json_body(payload)?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token, TokenScope::Activation);
    v.finish()?;

    let mut user = match state
        .store
        .get_user_for_token(TokenScope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(ApiError::field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    user.version = state.store.update_user(&user).await?;

    state
        .store
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;

    tracing::info!(user_id = user.id, "User activated");

    Ok(Json(UserResponse { user }))
}
