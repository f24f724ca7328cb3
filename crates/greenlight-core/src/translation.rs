//! Multilingual categories and items.
//!
//! A category or item is a language-independent parent row plus one
//! translation row per language. Reads always pick a single language; a parent
//! without a translation in that language is invisible to that reader.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::language::Language;
use crate::validator::Validator;

/// Maximum translated text length in bytes.
pub const MAX_TEXT_BYTES: usize = 500;

/// Id of the category seeded by the schema. It cannot be deleted and items
/// fall back to it when their own category is removed.
pub const DEFAULT_CATEGORY_ID: i64 = 1;

/// How a second translation for the same `(parent, language)` pair is
/// handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationPolicy {
    /// Adding a language that already exists fails with a duplicate error.
    StrictInsert,
    /// Writing a language that already exists replaces its text and image.
    Upsert,
}

/// One language's text for a parent row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Language of this row.
    pub language: Language,
    /// Title (categories) or name (items).
    pub text: String,
    /// Image reference.
    pub image: String,
}

impl Translation {
    /// Create a translation.
    #[must_use]
    pub fn new(language: Language, text: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            language,
            text: text.into(),
            image: image.into(),
        }
    }

    /// Validate the text and image; `text_field` names the text in error
    /// messages (`title` for categories, `name` for items).
    pub fn validate(&self, v: &mut Validator, text_field: &str) {
        v.check(!self.text.is_empty(), text_field, "must be provided");
        v.check(
            self.text.len() <= MAX_TEXT_BYTES,
            text_field,
            "must not be more than 500 bytes long",
        );
        v.check(!self.image.is_empty(), "image", "must contain an image");
    }
}

/// A category joined with one of its translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Category id.
    pub id: i64,
    /// When the category was created.
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    /// Parent row version.
    #[serde(skip)]
    pub version: i32,
    /// Language of `title` and `image`.
    pub language: Language,
    /// Translated title.
    pub title: String,
    /// Translated image.
    pub image: String,
}

/// An item joined with one of its translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Item id.
    pub id: i64,
    /// Owning category.
    pub category_id: i64,
    /// When the item was created.
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    /// Parent row version.
    #[serde(skip)]
    pub version: i32,
    /// Language of `name` and `image`.
    pub language: Language,
    /// Translated name.
    pub name: String,
    /// Translated image.
    pub image: String,
}

/// An item parent row that lacks a translation in some language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UntranslatedItem {
    /// Item id.
    pub id: i64,
    /// Owning category.
    pub category_id: i64,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
}
