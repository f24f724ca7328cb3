//! Item handlers.
//!
//! Item translations are upserted: writing a language replaces whatever was
//! there.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use greenlight_core::{
    validate_language, Item, Language, Translation, UntranslatedItem, Validator,
    DEFAULT_CATEGORY_ID,
};

use crate::error::ApiError;
use crate::handlers::movies::MessageResponse;
use crate::handlers::{json_body, parse_id, request_language};
use crate::state::AppState;

/// Single item envelope.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    /// The item in the requested language.
    pub item: Item,
}

/// Item list envelope.
#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    /// Items translated into the requested language.
    pub items: Vec<Item>,
}

/// Items missing a language.
#[derive(Debug, Serialize)]
pub struct UntranslatedItemsResponse {
    /// Items with no translation in the requested language.
    pub items: Vec<UntranslatedItem>,
}

/// New item, written in English.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    /// Owning category.
    #[serde(default = "default_category")]
    pub category_id: i64,
    /// English name.
    #[serde(default)]
    pub name: String,
    /// Image.
    #[serde(default)]
    pub image: String,
}

fn default_category() -> i64 {
    DEFAULT_CATEGORY_ID
}

/// Item translation, optionally moving the item to another category.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateItemRequest {
    /// Language code.
    pub language: String,
    /// Translated name.
    pub name: String,
    /// Translated image.
    pub image: String,
    /// New owning category.
    pub category_id: Option<i64>,
}

/// List items in the `Accept-Language` language.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListItemsResponse>, ApiError> {
    let language = request_language(&headers)?;
    let items = state.store.list_items(language).await?;
    Ok(Json(ListItemsResponse { items }))
}

/// Fetch an item in the `Accept-Language` language.
pub async fn show_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ItemResponse>, ApiError> {
    let id = parse_id(&id)?;
    let language = request_language(&headers)?;
    let item = state.store.get_item(id, language).await?;
    Ok(Json(ItemResponse { item }))
}

/// List items that have no translation in `lang`.
pub async fn list_untranslated_items(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
) -> Result<Json<UntranslatedItemsResponse>, ApiError> {
    let mut v = Validator::new();
    let language = validate_language(&mut v, &lang);
    v.finish()?;
    let language = language.ok_or(ApiError::NotFound)?;

    let items = state.store.list_untranslated_items(language).await?;
    Ok(Json(UntranslatedItemsResponse { items }))
}

/// Create an item with its English translation.
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;
    let translation = Translation::new(Language::En, input.name, input.image);

    let mut v = Validator::new();
    v.check(input.category_id > 0, "category_id", "must be a positive integer");
    translation.validate(&mut v, "name");
    v.finish()?;

    let item = state
        .store
        .insert_item(input.category_id, &translation)
        .await?;

    tracing::info!(item_id = item.id, category_id = item.category_id, "Item created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/items/{}", item.id))],
        Json(ItemResponse { item }),
    ))
}

/// Insert or replace one translation of an item.
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    let id = parse_id(&id)?;
    let input = json_body(payload)?;

    let mut v = Validator::new();
    let language = validate_language(&mut v, &input.language);
    if let Some(category_id) = input.category_id {
        v.check(category_id > 0, "category_id", "must be a positive integer");
    }
    let translation = Translation::new(language.unwrap_or(Language::En), input.name, input.image);
    translation.validate(&mut v, "name");
    v.finish()?;

    state
        .store
        .update_item(id, &translation, input.category_id)
        .await?;
    let item = state.store.get_item(id, translation.language).await?;

    tracing::info!(item_id = id, language = %translation.language, "Item translation saved");

    Ok(Json(ItemResponse { item }))
}

/// Delete an item.
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete_item(id).await?;

    tracing::info!(item_id = id, "Item deleted");

    Ok(Json(MessageResponse {
        message: "item successfully deleted".to_string(),
    }))
}
