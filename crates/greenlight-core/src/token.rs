//! Scoped, expiring credentials.
//!
//! A token's plaintext is handed to the user exactly once. Only its SHA-256
//! hash is persisted, so a leaked tokens table cannot be replayed.

use std::fmt;
use std::str::FromStr;

use base32::Alphabet;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::validator::Validator;

/// Plaintext length of activation tokens.
pub const ACTIVATION_TOKEN_LEN: usize = 6;

/// Plaintext length of authentication tokens.
pub const AUTHENTICATION_TOKEN_LEN: usize = 32;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    /// Account activation, sent out after registration.
    Activation,
    /// Session authentication, sent as a bearer token.
    Authentication,
}

impl TokenScope {
    /// Name stored in the `scope` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }

    /// Exact plaintext length for this scope.
    #[must_use]
    pub const fn plaintext_len(self) -> usize {
        match self {
            Self::Activation => ACTIVATION_TOKEN_LEN,
            Self::Authentication => AUTHENTICATION_TOKEN_LEN,
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenScope {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "activation" => Ok(Self::Activation),
            "authentication" => Ok(Self::Authentication),
            other => Err(CoreError::UnrecognizedScope(other.to_string())),
        }
    }
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// Plaintext, returned to the caller once and never stored.
    #[serde(rename = "token")]
    pub plaintext: String,
    /// SHA-256 of the plaintext.
    #[serde(skip)]
    pub hash: Vec<u8>,
    /// Owner.
    #[serde(skip)]
    pub user_id: i64,
    /// Instant after which the token is no longer accepted.
    pub expiry: DateTime<Utc>,
    /// Purpose.
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Generate a token for `user_id` that expires `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenGeneration`] if the OS random source fails or
    /// the encoded value is shorter than the scope requires.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Self> {
        let len = scope.plaintext_len();
        let mut random_bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut random_bytes)
            .map_err(|e| CoreError::TokenGeneration(e.to_string()))?;

        let plaintext = encode_plaintext(&random_bytes, len)?;
        let hash = hash_plaintext(&plaintext).to_vec();

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        })
    }
}

/// Base32-encode `bytes` without padding and cut the result to `len` chars.
fn encode_plaintext(bytes: &[u8], len: usize) -> Result<String> {
    let mut encoded = base32::encode(Alphabet::Rfc4648 { padding: false }, bytes);
    if encoded.len() < len {
        return Err(CoreError::TokenGeneration(format!(
            "encoded token is {} characters, need {len}",
            encoded.len()
        )));
    }
    encoded.truncate(len);
    Ok(encoded)
}

/// SHA-256 digest of a token plaintext.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// Check that `plaintext` is present and exactly as long as `scope` requires.
pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str, scope: TokenScope) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    let len = scope.plaintext_len();
    v.check(
        plaintext.chars().count() == len,
        "token",
        format!("must be {len} characters long"),
    );
}

/// Like [`validate_token_plaintext`] for a scope given as a string. An
/// unknown scope is recorded as a `token` error, never accepted.
pub fn validate_token_plaintext_for(v: &mut Validator, plaintext: &str, scope: &str) {
    match scope.parse::<TokenScope>() {
        Ok(scope) => validate_token_plaintext(v, plaintext, scope),
        Err(_) => {
            v.check(!plaintext.is_empty(), "token", "must be provided");
            v.add_error("token", "scope not defined");
        }
    }
}
