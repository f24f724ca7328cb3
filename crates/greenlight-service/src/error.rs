//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use greenlight_core::{CoreError, ValidationErrors};
use greenlight_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, malformed, or expired authentication token.
    #[error("invalid or missing authentication token")]
    Unauthorized,

    /// Email and password did not match.
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// Authenticated, but the account is not activated yet.
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    /// Resource not found.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Bad request - malformed input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The record changed since the client read it.
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    /// The record is protected from deletion.
    #[error("{0}")]
    CannotDeleteProtected(String),

    /// One or more fields failed validation.
    #[error("validation failed")]
    ValidationFailed(ValidationErrors),

    /// The client exceeded its request budget.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The store did not answer in time.
    #[error("the server is temporarily unable to handle the request")]
    Timeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A validation failure on a single field.
    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationFailed(ValidationErrors::single(field, message))
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
                None,
            ),
            Self::InactiveAccount => (
                StatusCode::FORBIDDEN,
                "inactive_account",
                self.to_string(),
                None,
            ),
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::EditConflict => (
                StatusCode::CONFLICT,
                "edit_conflict",
                self.to_string(),
                None,
            ),
            Self::CannotDeleteProtected(msg) => {
                (StatusCode::CONFLICT, "protected", msg.clone(), None)
            }
            Self::ValidationFailed(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                self.to_string(),
                serde_json::to_value(errors).ok(),
            ),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                self.to_string(),
                None,
            ),
            Self::Timeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "timeout",
                self.to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::DuplicateTranslation => {
                Self::field("language", "a translation in this language already exists")
            }
            StoreError::DuplicateEmail => {
                Self::field("email", "a user with this email address already exists")
            }
            StoreError::CategoryDoesNotExist => Self::field("category_id", "category does not exist"),
            StoreError::CannotDeleteProtected => {
                Self::CannotDeleteProtected("the default category cannot be deleted".into())
            }
            StoreError::Timeout => Self::Timeout,
            StoreError::Database(msg) => Self::Internal(msg),
            StoreError::Core(err) => err.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationFailed(errors) => Self::ValidationFailed(errors),
            CoreError::UnsupportedLanguage(code) => {
                Self::field("language", format!("{code} not an allowed language"))
            }
            CoreError::UnrecognizedScope(_) => Self::field("token", "scope not defined"),
            CoreError::InvalidRuntimeFormat => Self::BadRequest(err.to_string()),
            CoreError::TokenGeneration(msg) | CoreError::PasswordHash(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::NotFound, StatusCode::NOT_FOUND),
            (StoreError::EditConflict, StatusCode::CONFLICT),
            (StoreError::CannotDeleteProtected, StatusCode::CONFLICT),
            (StoreError::DuplicateTranslation, StatusCode::UNPROCESSABLE_ENTITY),
            (StoreError::DuplicateEmail, StatusCode::UNPROCESSABLE_ENTITY),
            (StoreError::CategoryDoesNotExist, StatusCode::UNPROCESSABLE_ENTITY),
            (StoreError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                StoreError::Database("connection reset".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn runtime_format_is_a_bad_request() {
        let err = ApiError::from(CoreError::InvalidRuntimeFormat);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
