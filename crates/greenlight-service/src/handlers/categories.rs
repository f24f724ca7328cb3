//! Category handlers.
//!
//! Categories take translations strictly: adding a language that already
//! exists is rejected, and changing one goes through the update route.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use greenlight_core::{validate_language, Category, Language, Translation, Validator};

use crate::error::ApiError;
use crate::handlers::movies::MessageResponse;
use crate::handlers::{json_body, parse_id, request_language};
use crate::state::AppState;

/// Single category envelope.
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    /// The category in the requested language.
    pub category: Category,
}

/// Category list envelope.
#[derive(Debug, Serialize)]
pub struct ListCategoriesResponse {
    /// Categories translated into the requested language.
    pub categories: Vec<Category>,
}

/// New category, written in English.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateCategoryRequest {
    /// English title.
    pub title: String,
    /// Image.
    pub image: String,
}

/// A category translation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryTranslationRequest {
    /// Language code.
    pub language: String,
    /// Translated title.
    pub title: String,
    /// Translated image. Falls back to the English image when empty.
    pub image: String,
}

/// List categories in the `Accept-Language` language.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListCategoriesResponse>, ApiError> {
    let language = request_language(&headers)?;
    let categories = state.store.list_categories(language).await?;
    Ok(Json(ListCategoriesResponse { categories }))
}

/// Fetch a category in the `Accept-Language` language.
pub async fn show_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CategoryResponse>, ApiError> {
    let id = parse_id(&id)?;
    let language = request_language(&headers)?;
    let category = state.store.get_category(id, language).await?;
    Ok(Json(CategoryResponse { category }))
}

/// Create a category with its English translation.
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;
    let translation = Translation::new(Language::En, input.title, input.image);

    let mut v = Validator::new();
    translation.validate(&mut v, "title");
    v.finish()?;

    let category = state.store.insert_category(&translation).await?;

    tracing::info!(category_id = category.id, "Category created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/categories/{}", category.id))],
        Json(CategoryResponse { category }),
    ))
}

/// Add a language to a category. Fails if that language already exists.
pub async fn add_category_translation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<CategoryTranslationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let input = json_body(payload)?;
    let translation = translation_from_request(&state, id, input).await?;

    state.store.add_category_translation(id, &translation).await?;
    let category = state.store.get_category(id, translation.language).await?;

    tracing::info!(category_id = id, language = %translation.language, "Category translation added");

    Ok((StatusCode::CREATED, Json(CategoryResponse { category })))
}

/// Replace an existing category translation.
pub async fn update_category_translation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<CategoryTranslationRequest>, JsonRejection>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let id = parse_id(&id)?;
    let input = json_body(payload)?;
    let translation = translation_from_request(&state, id, input).await?;

    state
        .store
        .update_category_translation(id, &translation)
        .await?;
    let category = state.store.get_category(id, translation.language).await?;

    tracing::info!(category_id = id, language = %translation.language, "Category translation updated");

    Ok(Json(CategoryResponse { category }))
}

/// Delete a category. Its items move to the default category.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete_category(id).await?;

    tracing::info!(category_id = id, "Category deleted");

    Ok(Json(MessageResponse {
        message: "category successfully deleted".to_string(),
    }))
}

/// Validate a translation request. An empty image borrows the English one,
/// which also confirms the category exists.
async fn translation_from_request(
    state: &AppState,
    id: i64,
    input: CategoryTranslationRequest,
) -> Result<Translation, ApiError> {
    let mut v = Validator::new();
    let language = validate_language(&mut v, &input.language);
    let english = state.store.get_category(id, Language::En).await?;

    let image = if input.image.is_empty() {
        english.image
    } else {
        input.image
    };

    let translation = Translation::new(language.unwrap_or(Language::En), input.title, image);
    translation.validate(&mut v, "title");
    v.finish()?;

    Ok(translation)
}
