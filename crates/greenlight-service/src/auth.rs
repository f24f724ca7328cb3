//! Authentication extractors.
//!
//! - `AuthUser` - any user holding a valid authentication token
//! - `ActiveUser` - an authenticated user whose account is activated

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use greenlight_core::{validate_token_plaintext, TokenScope, User, Validator};
use greenlight_store::StoreError;

use crate::error::ApiError;
use crate::state::AppState;

/// A user authenticated with `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or(ApiError::Unauthorized)?;

            // Reject malformed tokens before touching the store.
            let mut v = Validator::new();
            validate_token_plaintext(&mut v, token, TokenScope::Authentication);
            if !v.valid() {
                return Err(ApiError::Unauthorized);
            }

            match state
                .store
                .get_user_for_token(TokenScope::Authentication, token)
                .await
            {
                Ok(user) => Ok(AuthUser(user)),
                Err(StoreError::NotFound) => Err(ApiError::Unauthorized),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// An authenticated user with an activated account.
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

impl FromRequestParts<Arc<AppState>> for ActiveUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
            if !user.activated {
                return Err(ApiError::InactiveAccount);
            }
            Ok(ActiveUser(user))
        })
    }
}
