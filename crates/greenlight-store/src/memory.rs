//! In-memory storage implementation.
//!
//! Mirrors the constraints of the PostgreSQL schema in plain maps so the
//! service can be exercised without a database.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use greenlight_core::{
    hash_plaintext, Category, Filters, Item, Language, Metadata, Movie, NewMovie, NewUser,
    SortDirection, Token, TokenScope, Translation, UntranslatedItem, User, DEFAULT_CATEGORY_ID,
};

use crate::error::{Result, StoreError};
use crate::{CategoryStore, ItemStore, MovieStore, TokenStore, UserStore};

#[derive(Debug, Clone)]
struct Parent {
    created_at: DateTime<Utc>,
    version: i32,
}

#[derive(Debug, Clone)]
struct ItemParent {
    category_id: i64,
    created_at: DateTime<Utc>,
    version: i32,
}

#[derive(Debug, Clone)]
struct TokenRow {
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

#[derive(Debug)]
struct State {
    next_id: i64,
    movies: BTreeMap<i64, Movie>,
    categories: BTreeMap<i64, Parent>,
    category_translations: BTreeMap<(i64, Language), Translation>,
    items: BTreeMap<i64, ItemParent>,
    item_translations: BTreeMap<(i64, Language), Translation>,
    users: BTreeMap<i64, User>,
    tokens: HashMap<Vec<u8>, TokenRow>,
}

impl State {
    fn seeded() -> Self {
        let mut state = Self {
            next_id: DEFAULT_CATEGORY_ID + 1,
            movies: BTreeMap::new(),
            categories: BTreeMap::new(),
            category_translations: BTreeMap::new(),
            items: BTreeMap::new(),
            item_translations: BTreeMap::new(),
            users: BTreeMap::new(),
            tokens: HashMap::new(),
        };
        state.categories.insert(
            DEFAULT_CATEGORY_ID,
            Parent {
                created_at: Utc::now(),
                version: 1,
            },
        );
        for (language, title) in [(Language::En, "Uncategorized"), (Language::Ar, "غير مصنف")] {
            state.category_translations.insert(
                (DEFAULT_CATEGORY_ID, language),
                Translation::new(language, title, "uncategorized.png"),
            );
        }
        state
    }

    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

/// Storage backed by process memory. All data is lost on drop.
///
/// Ids come from one shared counter, so ids are unique across tables. The
/// default category is seeded on construction, as the migrations do.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store holding only the default category.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::seeded()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Every lower-cased word of `query` appears among the words of `title`.
fn title_matches(title: &str, query: &str) -> bool {
    let words: Vec<String> = title.split_whitespace().map(str::to_lowercase).collect();
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .all(|q| words.contains(&q))
}

fn compare_movies(a: &Movie, b: &Movie, column: &str) -> Ordering {
    match column {
        "title" => a.title.cmp(&b.title),
        "year" => a.year.cmp(&b.year),
        "runtime" => a.runtime.cmp(&b.runtime),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie> {
        let mut state = self.lock();
        let id = state.next_id();
        let stored = Movie {
            id,
            created_at: Utc::now(),
            title: movie.title.clone(),
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres.clone(),
            version: 1,
        };
        state.movies.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_movie(&self, id: i64) -> Result<Movie> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.lock()
            .movies
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_movie(&self, movie: &Movie) -> Result<i32> {
        let mut state = self.lock();
        let stored = state
            .movies
            .get_mut(&movie.id)
            .filter(|stored| stored.version == movie.version)
            .ok_or(StoreError::EditConflict)?;

        stored.title.clone_from(&movie.title);
        stored.year = movie.year;
        stored.runtime = movie.runtime;
        stored.genres.clone_from(&movie.genres);
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete_movie(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.lock()
            .movies
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_movies(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata)> {
        let (column, direction) = filters.compile_sort();

        let mut matched: Vec<Movie> = self
            .lock()
            .movies
            .values()
            .filter(|m| title.is_empty() || title_matches(&m.title, title))
            .filter(|m| genres.iter().all(|g| m.genres.contains(g)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let primary = compare_movies(a, b, column);
            let primary = match direction {
                SortDirection::Ascending => primary,
                SortDirection::Descending => primary.reverse(),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = i64::try_from(matched.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(filters.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filters.limit()).unwrap_or(0);
        let page: Vec<Movie> = matched.into_iter().skip(offset).take(limit).collect();

        // A page past the end reports no metadata, as the windowed count does.
        let metadata = if page.is_empty() {
            Metadata::default()
        } else {
            Metadata::calculate(total, filters.page, filters.page_size)
        };
        Ok((page, metadata))
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn insert_category(&self, translation: &Translation) -> Result<Category> {
        let mut state = self.lock();
        let id = state.next_id();
        let parent = Parent {
            created_at: Utc::now(),
            version: 1,
        };
        let category = Category {
            id,
            created_at: parent.created_at,
            version: parent.version,
            language: translation.language,
            title: translation.text.clone(),
            image: translation.image.clone(),
        };
        state.categories.insert(id, parent);
        state
            .category_translations
            .insert((id, translation.language), translation.clone());
        Ok(category)
    }

    async fn get_category(&self, id: i64, language: Language) -> Result<Category> {
        let state = self.lock();
        let parent = state.categories.get(&id).ok_or(StoreError::NotFound)?;
        let translation = state
            .category_translations
            .get(&(id, language))
            .ok_or(StoreError::NotFound)?;
        Ok(Category {
            id,
            created_at: parent.created_at,
            version: parent.version,
            language,
            title: translation.text.clone(),
            image: translation.image.clone(),
        })
    }

    async fn list_categories(&self, language: Language) -> Result<Vec<Category>> {
        let state = self.lock();
        Ok(state
            .categories
            .iter()
            .filter_map(|(&id, parent)| {
                state
                    .category_translations
                    .get(&(id, language))
                    .map(|t| Category {
                        id,
                        created_at: parent.created_at,
                        version: parent.version,
                        language,
                        title: t.text.clone(),
                        image: t.image.clone(),
                    })
            })
            .collect())
    }

    async fn add_category_translation(&self, id: i64, translation: &Translation) -> Result<()> {
        let mut state = self.lock();
        if !state.categories.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        let key = (id, translation.language);
        if state.category_translations.contains_key(&key) {
            return Err(StoreError::DuplicateTranslation);
        }
        state.category_translations.insert(key, translation.clone());
        if let Some(parent) = state.categories.get_mut(&id) {
            parent.version += 1;
        }
        Ok(())
    }

    async fn update_category_translation(
        &self,
        id: i64,
        translation: &Translation,
    ) -> Result<()> {
        let mut state = self.lock();
        let existing = state
            .category_translations
            .get_mut(&(id, translation.language))
            .ok_or(StoreError::NotFound)?;
        existing.text.clone_from(&translation.text);
        existing.image.clone_from(&translation.image);
        if let Some(parent) = state.categories.get_mut(&id) {
            parent.version += 1;
        }
        Ok(())
    }

    async fn delete_category(&self, id: i64) -> Result<()> {
        let mut state = self.lock();
        if !state.categories.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if id == DEFAULT_CATEGORY_ID {
            return Err(StoreError::CannotDeleteProtected);
        }
        state.categories.remove(&id);
        state.category_translations.retain(|(owner, _), _| *owner != id);
        for item in state.items.values_mut() {
            if item.category_id == id {
                item.category_id = DEFAULT_CATEGORY_ID;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert_item(&self, category_id: i64, translation: &Translation) -> Result<Item> {
        let mut state = self.lock();
        if !state.categories.contains_key(&category_id) {
            return Err(StoreError::CategoryDoesNotExist);
        }
        let id = state.next_id();
        let parent = ItemParent {
            category_id,
            created_at: Utc::now(),
            version: 1,
        };
        let item = Item {
            id,
            category_id,
            created_at: parent.created_at,
            version: parent.version,
            language: translation.language,
            name: translation.text.clone(),
            image: translation.image.clone(),
        };
        state.items.insert(id, parent);
        state
            .item_translations
            .insert((id, translation.language), translation.clone());
        Ok(item)
    }

    async fn get_item(&self, id: i64, language: Language) -> Result<Item> {
        let state = self.lock();
        let parent = state.items.get(&id).ok_or(StoreError::NotFound)?;
        let translation = state
            .item_translations
            .get(&(id, language))
            .ok_or(StoreError::NotFound)?;
        Ok(Item {
            id,
            category_id: parent.category_id,
            created_at: parent.created_at,
            version: parent.version,
            language,
            name: translation.text.clone(),
            image: translation.image.clone(),
        })
    }

    async fn list_items(&self, language: Language) -> Result<Vec<Item>> {
        let state = self.lock();
        Ok(state
            .items
            .iter()
            .filter_map(|(&id, parent)| {
                state.item_translations.get(&(id, language)).map(|t| Item {
                    id,
                    category_id: parent.category_id,
                    created_at: parent.created_at,
                    version: parent.version,
                    language,
                    name: t.text.clone(),
                    image: t.image.clone(),
                })
            })
            .collect())
    }

    async fn list_untranslated_items(&self, language: Language) -> Result<Vec<UntranslatedItem>> {
        let state = self.lock();
        Ok(state
            .items
            .iter()
            .filter(|(id, _)| !state.item_translations.contains_key(&(**id, language)))
            .map(|(&id, parent)| UntranslatedItem {
                id,
                category_id: parent.category_id,
                created_at: parent.created_at,
            })
            .collect())
    }

    async fn update_item(
        &self,
        id: i64,
        translation: &Translation,
        category_id: Option<i64>,
    ) -> Result<()> {
        let mut state = self.lock();
        if !state.items.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(category_id) = category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(StoreError::CategoryDoesNotExist);
            }
        }

        let key = (id, translation.language);
        let text_changed = state.item_translations.get(&key) != Some(translation);
        if text_changed {
            state.item_translations.insert(key, translation.clone());
        }
        if let Some(parent) = state.items.get_mut(&id) {
            let moved = category_id.is_some_and(|c| c != parent.category_id);
            if let Some(category_id) = category_id {
                parent.category_id = category_id;
            }
            // Repeating an identical write leaves the version alone.
            if text_changed || moved {
                parent.version += 1;
            }
        }
        Ok(())
    }

    async fn update_item_category(&self, id: i64, category_id: i64) -> Result<()> {
        let mut state = self.lock();
        if !state.categories.contains_key(&category_id) {
            return Err(StoreError::CategoryDoesNotExist);
        }
        let parent = state.items.get_mut(&id).ok_or(StoreError::NotFound)?;
        parent.category_id = category_id;
        parent.version += 1;
        Ok(())
    }

    async fn delete_item(&self, id: i64) -> Result<()> {
        let mut state = self.lock();
        state.items.remove(&id).ok_or(StoreError::NotFound)?;
        state.item_translations.retain(|(owner, _), _| *owner != id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let mut state = self.lock();
        if state.email_taken(&user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        let id = state.next_id();
        let stored = User {
            id,
            created_at: Utc::now(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            activated: false,
            version: 1,
        };
        state.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<i32> {
        let mut state = self.lock();
        let current = state
            .users
            .get(&user.id)
            .filter(|stored| stored.version == user.version)
            .ok_or(StoreError::EditConflict)?;
        let version = current.version + 1;
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::DuplicateEmail);
        }
        let mut updated = user.clone();
        updated.version = version;
        state.users.insert(user.id, updated);
        Ok(version)
    }

    async fn get_user_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User> {
        let hash = hash_plaintext(plaintext);
        let state = self.lock();
        let token = state
            .tokens
            .get(&hash[..])
            .filter(|t| t.scope == scope && t.expiry > Utc::now())
            .ok_or(StoreError::NotFound)?;
        state
            .users
            .get(&token.user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: &Token) -> Result<()> {
        let mut state = self.lock();
        if !state.users.contains_key(&token.user_id) {
            return Err(StoreError::Database(format!(
                "token owner {} does not exist",
                token.user_id
            )));
        }
        state.tokens.insert(
            token.hash.clone(),
            TokenRow {
                user_id: token.user_id,
                expiry: token.expiry,
                scope: token.scope,
            },
        );
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        self.lock()
            .tokens
            .retain(|_, t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}
