//! User accounts.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::validator::{matches_email, Validator};

/// Maximum name length in bytes.
pub const MAX_NAME_BYTES: usize = 500;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Store-assigned identifier.
    pub id: i64,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
    /// Display name.
    pub name: String,
    /// Unique email address.
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip)]
    pub password_hash: String,
    /// Whether the activation token has been redeemed.
    pub activated: bool,
    /// Incremented on every update.
    #[serde(skip)]
    pub version: i32,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Argon2 PHC string, see [`hash_password`].
    pub password_hash: String,
}

/// Validate an email address.
pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches_email(email), "email", "must be a valid email address");
}

/// Validate a plaintext password.
pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(
        password.len() <= 72,
        "password",
        "must not be more than 72 bytes long",
    );
}

impl NewUser {
    /// Validate name and email. The password is validated in plaintext form
    /// before hashing with [`validate_password_plaintext`].
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.name.is_empty(), "name", "must be provided");
        v.check(
            self.name.len() <= MAX_NAME_BYTES,
            "name",
            "must not be more than 500 bytes long",
        );
        validate_email(v, &self.email);
    }
}

/// Hash a plaintext password into an Argon2 PHC string.
///
/// # Errors
///
/// Returns [`CoreError::PasswordHash`] if hashing fails.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::PasswordHash(e.to_string()))
}

/// Check `plaintext` against a stored PHC string.
///
/// # Errors
///
/// Returns [`CoreError::PasswordHash`] if the stored hash cannot be parsed.
pub fn verify_password(plaintext: &str, password_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}
