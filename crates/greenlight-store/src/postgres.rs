//! PostgreSQL storage implementation.
//!
//! Every call is bounded by [`StoreConfig::query_timeout`]. Constraint
//! violations raised by the schema are translated into the matching
//! [`StoreError`] variants:
//!
//! | SQLSTATE | Raised by | Mapped to |
//! |---|---|---|
//! | `23505` | translation or email uniqueness | `DuplicateTranslation` / `DuplicateEmail` |
//! | `23503` | `items.category_id` foreign key | `CategoryDoesNotExist` |
//! | `23001` | default category trigger | `CannotDeleteProtected` |

use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgConnection, PgPool};

use greenlight_core::{
    hash_plaintext, Category, Filters, Item, Language, Metadata, Movie, NewMovie, NewUser,
    Runtime, Token, TokenScope, Translation, UntranslatedItem, User,
};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::{CategoryStore, ItemStore, MovieStore, TokenStore, UserStore};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const RESTRICT_VIOLATION: &str = "23001";

/// PostgreSQL-backed storage implementation.
pub struct PgStore {
    pool: PgPool,
    config: StoreConfig,
}

#[derive(Debug, FromRow)]
struct MovieRow {
    id: i64,
    created_at: DateTime<Utc>,
    title: String,
    year: i32,
    runtime: i32,
    genres: Vec<String>,
    version: i32,
}

#[derive(Debug, FromRow)]
struct MovieListRow {
    total: i64,
    #[sqlx(flatten)]
    movie: MovieRow,
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    created_at: DateTime<Utc>,
    version: i32,
    title: String,
    image: String,
}

#[derive(Debug, FromRow)]
struct CategoryParentRow {
    id: i64,
    created_at: DateTime<Utc>,
    version: i32,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    category_id: i64,
    created_at: DateTime<Utc>,
    version: i32,
    name: String,
    image: String,
}

#[derive(Debug, FromRow)]
struct ItemParentRow {
    id: i64,
    category_id: i64,
    created_at: DateTime<Utc>,
    version: i32,
}

#[derive(Debug, FromRow)]
struct UntranslatedItemRow {
    id: i64,
    category_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    created_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            year: row.year,
            runtime: Runtime(row.runtime),
            genres: row.genres,
            version: row.version,
        }
    }
}

impl CategoryRow {
    fn into_category(self, language: Language) -> Category {
        Category {
            id: self.id,
            created_at: self.created_at,
            version: self.version,
            language,
            title: self.title,
            image: self.image,
        }
    }
}

impl ItemRow {
    fn into_item(self, language: Language) -> Item {
        Item {
            id: self.id,
            category_id: self.category_id,
            created_at: self.created_at,
            version: self.version,
            language,
            name: self.name,
            image: self.image,
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            activated: row.activated,
            version: row.version,
        }
    }
}

const USER_COLUMNS: &str =
    "users.id, users.created_at, users.name, users.email::text AS email, users.password_hash, users.activated, users.version";

impl PgStore {
    /// Connect to `url`, apply pending migrations and return the store.
    ///
    /// The pool's acquire timeout equals the query timeout, so a saturated
    /// pool surfaces as [`StoreError::Timeout`] instead of hanging.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or a
    /// migration fails.
    pub async fn connect(url: &str, config: StoreConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.query_timeout)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(
            max_connections = config.max_connections,
            query_timeout_ms = u64::try_from(config.query_timeout.as_millis()).unwrap_or(u64::MAX),
            "PostgreSQL store ready"
        );

        Ok(Self { pool, config })
    }

    /// Wrap an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Run `fut`, failing with [`StoreError::Timeout`] once the configured
    /// query timeout elapses.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>> + Send) -> Result<T> {
        if let Ok(result) = tokio::time::timeout(self.config.query_timeout, fut).await {
            result
        } else {
            tracing::warn!(
                timeout_ms = u64::try_from(self.config.query_timeout.as_millis()).unwrap_or(u64::MAX),
                "Query timed out"
            );
            Err(StoreError::Timeout)
        }
    }
}

/// Whether `err` is a database error with SQLSTATE `code`.
fn has_code(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().is_some_and(|c| c == code);
    }
    false
}

/// Map `err` to `mapped` when it carries SQLSTATE `code`.
fn map_code(err: sqlx::Error, code: &str, mapped: StoreError) -> StoreError {
    if has_code(&err, code) {
        mapped
    } else {
        err.into()
    }
}

async fn insert_category_parent(conn: &mut PgConnection) -> Result<CategoryParentRow> {
    let row = sqlx::query_as::<_, CategoryParentRow>(
        "INSERT INTO categories DEFAULT VALUES RETURNING id, created_at, version",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

async fn insert_category_translation(
    conn: &mut PgConnection,
    category_id: i64,
    translation: &Translation,
) -> Result<()> {
    sqlx::query(
        r"INSERT INTO category_translations (category_id, language_code, title, image)
          VALUES ($1, $2, $3, $4)",
    )
    .bind(category_id)
    .bind(translation.language.code())
    .bind(&translation.text)
    .bind(&translation.image)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if has_code(&e, FOREIGN_KEY_VIOLATION) {
            StoreError::NotFound
        } else {
            map_code(e, UNIQUE_VIOLATION, StoreError::DuplicateTranslation)
        }
    })?;
    Ok(())
}

async fn insert_item_parent(conn: &mut PgConnection, category_id: i64) -> Result<ItemParentRow> {
    sqlx::query_as::<_, ItemParentRow>(
        "INSERT INTO items (category_id) VALUES ($1) RETURNING id, category_id, created_at, version",
    )
    .bind(category_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_code(e, FOREIGN_KEY_VIOLATION, StoreError::CategoryDoesNotExist))
}

/// Insert or replace a translation. Returns `false` when the stored row
/// already held the same name and image.
async fn upsert_item_translation(
    conn: &mut PgConnection,
    item_id: i64,
    translation: &Translation,
) -> Result<bool> {
    let result = sqlx::query(
        r"INSERT INTO item_translations (item_id, language_code, name, image)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (item_id, language_code)
          DO UPDATE SET name = EXCLUDED.name, image = EXCLUDED.image
          WHERE (item_translations.name, item_translations.image)
                IS DISTINCT FROM (EXCLUDED.name, EXCLUDED.image)",
    )
    .bind(item_id)
    .bind(translation.language.code())
    .bind(&translation.text)
    .bind(&translation.image)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_code(e, FOREIGN_KEY_VIOLATION, StoreError::NotFound))?;
    Ok(result.rows_affected() > 0)
}

/// Point `item_id` at `category_id`. The version is bumped when the category
/// changes or `force_bump` is set.
async fn reassign_item(
    conn: &mut PgConnection,
    item_id: i64,
    category_id: i64,
    force_bump: bool,
) -> Result<()> {
    let result = sqlx::query(
        r"UPDATE items
          SET category_id = $1,
              version = version + CASE WHEN $3 OR category_id IS DISTINCT FROM $1 THEN 1 ELSE 0 END
          WHERE id = $2",
    )
    .bind(category_id)
    .bind(item_id)
    .bind(force_bump)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_code(e, FOREIGN_KEY_VIOLATION, StoreError::CategoryDoesNotExist))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl MovieStore for PgStore {
    async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie> {
        self.bounded(async {
            let row = sqlx::query_as::<_, MovieRow>(
                r"INSERT INTO movies (title, year, runtime, genres)
                  VALUES ($1, $2, $3, $4)
                  RETURNING id, created_at, title, year, runtime, genres, version",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.minutes())
            .bind(&movie.genres)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.into())
        })
        .await
    }

    async fn get_movie(&self, id: i64) -> Result<Movie> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            sqlx::query_as::<_, MovieRow>(
                r"SELECT id, created_at, title, year, runtime, genres, version
                  FROM movies WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Movie::from)
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn update_movie(&self, movie: &Movie) -> Result<i32> {
        self.bounded(async {
            sqlx::query_scalar::<_, i32>(
                r"UPDATE movies
                  SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
                  WHERE id = $5 AND version = $6
                  RETURNING version",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.minutes())
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::EditConflict)
        })
        .await
    }

    async fn delete_movie(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            let result = sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn list_movies(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata)> {
        // The column comes from the safelist, never from raw input.
        let (column, direction) = filters.compile_sort();
        let query = format!(
            r"SELECT count(*) OVER() AS total, id, created_at, title, year, runtime, genres, version
              FROM movies
              WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
              AND (genres @> $2 OR $2 = '{{}}')
              ORDER BY {column} {}, id ASC
              LIMIT $3 OFFSET $4",
            direction.as_sql()
        );

        self.bounded(async {
            let rows = sqlx::query_as::<_, MovieListRow>(&query)
                .bind(title)
                .bind(genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;

            let total = rows.first().map_or(0, |row| row.total);
            let movies = rows.into_iter().map(|row| row.movie.into()).collect();
            Ok((
                movies,
                Metadata::calculate(total, filters.page, filters.page_size),
            ))
        })
        .await
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn insert_category(&self, translation: &Translation) -> Result<Category> {
        self.bounded(async {
            let parent = if self.config.atomic_translatable_insert {
                let mut tx = self.pool.begin().await?;
                let parent = insert_category_parent(&mut tx).await?;
                insert_category_translation(&mut tx, parent.id, translation).await?;
                tx.commit().await?;
                parent
            } else {
                let mut conn = self.pool.acquire().await?;
                let parent = insert_category_parent(&mut conn).await?;
                insert_category_translation(&mut conn, parent.id, translation).await?;
                parent
            };

            tracing::debug!(category_id = parent.id, language = %translation.language, "Category inserted");

            Ok(Category {
                id: parent.id,
                created_at: parent.created_at,
                version: parent.version,
                language: translation.language,
                title: translation.text.clone(),
                image: translation.image.clone(),
            })
        })
        .await
    }

    async fn get_category(&self, id: i64, language: Language) -> Result<Category> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            sqlx::query_as::<_, CategoryRow>(
                r"SELECT c.id, c.created_at, c.version, t.title, t.image
                  FROM categories c
                  INNER JOIN category_translations t ON t.category_id = c.id
                  WHERE c.id = $1 AND t.language_code = $2",
            )
            .bind(id)
            .bind(language.code())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.into_category(language))
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn list_categories(&self, language: Language) -> Result<Vec<Category>> {
        self.bounded(async {
            let rows = sqlx::query_as::<_, CategoryRow>(
                r"SELECT c.id, c.created_at, c.version, t.title, t.image
                  FROM categories c
                  INNER JOIN category_translations t ON t.category_id = c.id
                  WHERE t.language_code = $1
                  ORDER BY c.id",
            )
            .bind(language.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|row| row.into_category(language))
                .collect())
        })
        .await
    }

    async fn add_category_translation(&self, id: i64, translation: &Translation) -> Result<()> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            insert_category_translation(&mut tx, id, translation).await?;
            sqlx::query("UPDATE categories SET version = version + 1 WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn update_category_translation(
        &self,
        id: i64,
        translation: &Translation,
    ) -> Result<()> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query(
                r"UPDATE category_translations SET title = $1, image = $2
                  WHERE category_id = $3 AND language_code = $4",
            )
            .bind(&translation.text)
            .bind(&translation.image)
            .bind(id)
            .bind(translation.language.code())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            sqlx::query("UPDATE categories SET version = version + 1 WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn delete_category(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            let result = sqlx::query("DELETE FROM categories WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| map_code(e, RESTRICT_VIOLATION, StoreError::CannotDeleteProtected))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            tracing::debug!(category_id = id, "Category deleted");
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn insert_item(&self, category_id: i64, translation: &Translation) -> Result<Item> {
        self.bounded(async {
            let parent = if self.config.atomic_translatable_insert {
                let mut tx = self.pool.begin().await?;
                let parent = insert_item_parent(&mut tx, category_id).await?;
                upsert_item_translation(&mut tx, parent.id, translation).await?;
                tx.commit().await?;
                parent
            } else {
                let mut conn = self.pool.acquire().await?;
                let parent = insert_item_parent(&mut conn, category_id).await?;
                upsert_item_translation(&mut conn, parent.id, translation).await?;
                parent
            };

            tracing::debug!(item_id = parent.id, category_id, "Item inserted");

            Ok(Item {
                id: parent.id,
                category_id: parent.category_id,
                created_at: parent.created_at,
                version: parent.version,
                language: translation.language,
                name: translation.text.clone(),
                image: translation.image.clone(),
            })
        })
        .await
    }

    async fn get_item(&self, id: i64, language: Language) -> Result<Item> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            sqlx::query_as::<_, ItemRow>(
                r"SELECT i.id, i.category_id, i.created_at, i.version, t.name, t.image
                  FROM items i
                  INNER JOIN item_translations t ON t.item_id = i.id
                  WHERE i.id = $1 AND t.language_code = $2",
            )
            .bind(id)
            .bind(language.code())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.into_item(language))
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn list_items(&self, language: Language) -> Result<Vec<Item>> {
        self.bounded(async {
            let rows = sqlx::query_as::<_, ItemRow>(
                r"SELECT i.id, i.category_id, i.created_at, i.version, t.name, t.image
                  FROM items i
                  INNER JOIN item_translations t ON t.item_id = i.id
                  WHERE t.language_code = $1
                  ORDER BY i.id",
            )
            .bind(language.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|row| row.into_item(language)).collect())
        })
        .await
    }

    async fn list_untranslated_items(&self, language: Language) -> Result<Vec<UntranslatedItem>> {
        self.bounded(async {
            let rows = sqlx::query_as::<_, UntranslatedItemRow>(
                r"SELECT i.id, i.category_id, i.created_at
                  FROM items i
                  WHERE NOT EXISTS (
                      SELECT 1 FROM item_translations t
                      WHERE t.item_id = i.id AND t.language_code = $1
                  )
                  ORDER BY i.id",
            )
            .bind(language.code())
            .fetch_all(&self.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|row| UntranslatedItem {
                    id: row.id,
                    category_id: row.category_id,
                    created_at: row.created_at,
                })
                .collect())
        })
        .await
    }

    async fn update_item(
        &self,
        id: i64,
        translation: &Translation,
        category_id: Option<i64>,
    ) -> Result<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let changed = upsert_item_translation(&mut tx, id, translation).await?;
            match category_id {
                Some(category_id) => reassign_item(&mut tx, id, category_id, changed).await?,
                None if !changed => {}
                None => {
                    sqlx::query("UPDATE items SET version = version + 1 WHERE id = $1")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn update_item_category(&self, id: i64, category_id: i64) -> Result<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            reassign_item(&mut conn, id, category_id, false).await
        })
        .await
    }

    async fn delete_item(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.bounded(async {
            let result = sqlx::query("DELETE FROM items WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let query = format!(
            r"INSERT INTO users (name, email, password_hash, activated)
              VALUES ($1, $2::citext, $3, false)
              RETURNING {USER_COLUMNS}"
        );
        self.bounded(async {
            let row = sqlx::query_as::<_, UserRow>(&query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_code(e, UNIQUE_VIOLATION, StoreError::DuplicateEmail))?;
            Ok(row.into())
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE users.email = $1::citext");
        self.bounded(async {
            sqlx::query_as::<_, UserRow>(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
                .map(User::from)
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn update_user(&self, user: &User) -> Result<i32> {
        self.bounded(async {
            sqlx::query_scalar::<_, i32>(
                r"UPDATE users
                  SET name = $1, email = $2::citext, password_hash = $3, activated = $4,
                      version = version + 1
                  WHERE id = $5 AND version = $6
                  RETURNING version",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_code(e, UNIQUE_VIOLATION, StoreError::DuplicateEmail))?
            .ok_or(StoreError::EditConflict)
        })
        .await
    }

    async fn get_user_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User> {
        let hash = hash_plaintext(plaintext);
        let query = format!(
            r"SELECT {USER_COLUMNS}
              FROM users
              INNER JOIN tokens ON users.id = tokens.user_id
              WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3"
        );
        self.bounded(async {
            sqlx::query_as::<_, UserRow>(&query)
                .bind(&hash[..])
                .bind(scope.as_str())
                .bind(Utc::now())
                .fetch_optional(&self.pool)
                .await?
                .map(User::from)
                .ok_or(StoreError::NotFound)
        })
        .await
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: &Token) -> Result<()> {
        self.bounded(async {
            sqlx::query(
                "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        self.bounded(async {
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }
}
