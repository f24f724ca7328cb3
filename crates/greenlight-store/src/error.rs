//! Error types for greenlight storage.

use greenlight_core::CoreError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// The stored version no longer matches the one the caller read.
    #[error("edit conflict")]
    EditConflict,

    /// A translation for this language already exists.
    #[error("translation already exists")]
    DuplicateTranslation,

    /// Another user already has this email address.
    #[error("duplicate email")]
    DuplicateEmail,

    /// The referenced category does not exist.
    #[error("category does not exist")]
    CategoryDoesNotExist,

    /// The record is protected from deletion.
    #[error("record is protected and cannot be deleted")]
    CannotDeleteProtected,

    /// The query did not finish within the configured timeout.
    #[error("query timed out")]
    Timeout,

    /// A domain operation (token generation) failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::PoolTimedOut => Self::Timeout,
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("migration failed: {err}"))
    }
}
