//! Error types for greenlight.

use crate::validator::ValidationErrors;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Token scope string is not one of the known scopes.
    #[error("unrecognized token scope: {0}")]
    UnrecognizedScope(String),

    /// Language code is not in the allowed set.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Runtime was not in the `"<n> mins"` format.
    #[error("invalid runtime format")]
    InvalidRuntimeFormat,

    /// The random source or encoder could not produce a token.
    #[error("token generation failed: {0}")]
    TokenGeneration(String),

    /// Password hashing or hash parsing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// One or more fields failed validation.
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),
}

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}
