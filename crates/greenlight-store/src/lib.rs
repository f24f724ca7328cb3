//! Storage layer for greenlight.
//!
//! This crate persists movies, multilingual categories and items, users, and
//! their tokens. Two backends implement the same traits:
//!
//! - [`PgStore`]: PostgreSQL through `sqlx`, with migrations under
//!   `migrations/`.
//! - [`MemoryStore`]: in-process maps with the same semantics, used by tests
//!   and local development.
//!
//! # Translatable records
//!
//! Categories and items are split into a language-independent parent row and
//! one translation row per language. Reads always name a language and treat a
//! parent without a translation in that language as absent.
//!
//! # Example
//!
//! ```no_run
//! use greenlight_core::{Language, Translation};
//! use greenlight_store::{CategoryStore, MemoryStore};
//!
//! # async fn demo() -> greenlight_store::Result<()> {
//! let store = MemoryStore::new();
//! let drinks = store
//!     .insert_category(&Translation::new(Language::En, "Drinks", "drinks.png"))
//!     .await?;
//! store
//!     .add_category_translation(drinks.id, &Translation::new(Language::Ar, "مشروبات", "drinks.png"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::Duration;
use greenlight_core::{
    Category, Filters, Item, Language, Metadata, Movie, NewMovie, NewUser, Token, TokenScope,
    Translation, UntranslatedItem, User,
};

/// Versioned movie records.
#[async_trait]
pub trait MovieStore: Send + Sync {
    /// Insert a movie. The store assigns `id`, `created_at` and version 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie>;

    /// Get a movie by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if `id < 1` or no such movie exists.
    async fn get_movie(&self, id: i64) -> Result<Movie>;

    /// Write every field of `movie`, provided the stored version still equals
    /// `movie.version`. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::EditConflict` if the movie was changed or deleted
    /// since it was read. Nothing is written in that case.
    async fn update_movie(&self, movie: &Movie) -> Result<i32>;

    /// Delete a movie.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing was deleted.
    async fn delete_movie(&self, id: i64) -> Result<()>;

    /// List movies matching `title` (full-text, empty matches all) and
    /// containing every genre in `genres` (empty matches all), sorted and
    /// paged by `filters`.
    ///
    /// `filters` must already have passed
    /// [`validate_filters`](greenlight_core::validate_filters).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_movies(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata)>;
}

/// Categories and their translations. A second translation for an existing
/// language is rejected rather than merged.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Insert a category with its first translation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_category(&self, translation: &Translation) -> Result<Category>;

    /// Get a category in `language`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the category is absent or has no
    /// translation in `language`.
    async fn get_category(&self, id: i64, language: Language) -> Result<Category>;

    /// Every category translated into `language`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_categories(&self, language: Language) -> Result<Vec<Category>>;

    /// Add a translation in a language the category does not have yet.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the category does not exist.
    /// - `StoreError::DuplicateTranslation` if the language already exists.
    async fn add_category_translation(&self, id: i64, translation: &Translation) -> Result<()>;

    /// Replace the text and image of an existing translation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if there is no translation in that
    /// language.
    async fn update_category_translation(&self, id: i64, translation: &Translation)
        -> Result<()>;

    /// Delete a category and its translations. Its items move to the
    /// default category.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if nothing was deleted.
    /// - `StoreError::CannotDeleteProtected` for the default category.
    async fn delete_category(&self, id: i64) -> Result<()>;
}

/// Items and their translations. Writing a language that already exists
/// replaces it.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert an item in `category_id` with its first translation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CategoryDoesNotExist` if the category is missing.
    async fn insert_item(&self, category_id: i64, translation: &Translation) -> Result<Item>;

    /// Get an item in `language`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the item is absent or has no
    /// translation in `language`.
    async fn get_item(&self, id: i64, language: Language) -> Result<Item>;

    /// Every item translated into `language`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_items(&self, language: Language) -> Result<Vec<Item>>;

    /// Items with no translation in `language`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_untranslated_items(&self, language: Language) -> Result<Vec<UntranslatedItem>>;

    /// Insert or replace the translation for `translation.language` and,
    /// when `category_id` is set, move the item to that category. Both
    /// writes happen or neither does.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the item does not exist.
    /// - `StoreError::CategoryDoesNotExist` if `category_id` names a missing
    ///   category.
    async fn update_item(
        &self,
        id: i64,
        translation: &Translation,
        category_id: Option<i64>,
    ) -> Result<()>;

    /// Move an item to another category.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the item does not exist.
    /// - `StoreError::CategoryDoesNotExist` if the category is missing.
    async fn update_item_category(&self, id: i64, category_id: i64) -> Result<()>;

    /// Delete an item and its translations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing was deleted.
    async fn delete_item(&self, id: i64) -> Result<()>;
}

/// User accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user with version 1, not yet activated.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateEmail` if the email is taken.
    async fn insert_user(&self, user: &NewUser) -> Result<User>;

    /// Look a user up by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no user has that email.
    async fn get_user_by_email(&self, email: &str) -> Result<User>;

    /// Write `user` if its version is still current. Returns the new version.
    ///
    /// # Errors
    ///
    /// - `StoreError::EditConflict` on a version mismatch.
    /// - `StoreError::DuplicateEmail` if the new email is taken.
    async fn update_user(&self, user: &User) -> Result<i32>;

    /// The owner of an unexpired token with this plaintext and scope.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such token exists.
    async fn get_user_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User>;
}

/// Token persistence. Only hashes are stored.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a generated token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_token(&self, token: &Token) -> Result<()>;

    /// Delete every token of `scope` owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()>;

    /// Generate a token and persist it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Core` if generation fails, or the insert error.
    async fn new_token(&self, user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Token> {
        let token = Token::generate(user_id, ttl, scope)?;
        self.insert_token(&token).await?;
        Ok(token)
    }
}

/// Every store the service needs, as one object.
pub trait Store: MovieStore + CategoryStore + ItemStore + UserStore + TokenStore {}

impl<T> Store for T where T: MovieStore + CategoryStore + ItemStore + UserStore + TokenStore {}
