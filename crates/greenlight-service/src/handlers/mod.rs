//! API handlers.

pub mod categories;
pub mod health;
pub mod items;
pub mod movies;
pub mod tokens;
pub mod users;

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::Json;

use greenlight_core::{validate_language, Language, Validator};

use crate::error::ApiError;

/// Unwrap a JSON body, turning a rejection into a 400 with its message.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Parse a path id. Anything that is not a positive integer is a 404.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// Query string value for `key`, or `default` when missing or empty.
pub(crate) fn read_string(query: &HashMap<String, String>, key: &str, default: &str) -> String {
    query
        .get(key)
        .filter(|s| !s.is_empty())
        .map_or_else(|| default.to_string(), Clone::clone)
}

/// Integer query value for `key`. A non-integer records an error and yields
/// `default`.
pub(crate) fn read_int(
    query: &HashMap<String, String>,
    key: &str,
    default: i64,
    v: &mut Validator,
) -> i64 {
    match query.get(key).filter(|s| !s.is_empty()) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

/// Comma separated query value for `key`, or an empty list.
pub(crate) fn read_csv(query: &HashMap<String, String>, key: &str) -> Vec<String> {
    query
        .get(key)
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Language requested through `Accept-Language`. Only the primary subtag of
/// the first entry counts; a missing header means English.
pub(crate) fn request_language(headers: &HeaderMap) -> Result<Language, ApiError> {
    let code = headers
        .get("accept-language")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.split(';').next())
        .and_then(|v| v.split('-').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty() && v != "*");

    let Some(code) = code else {
        return Ok(Language::En);
    };

    let mut v = Validator::new();
    let language = validate_language(&mut v, &code);
    v.finish()?;
    language.ok_or_else(|| ApiError::field("language", "must be provided"))
}
