//! PostgreSQL store tests.
//!
//! Skipped unless `DATABASE_URL` points at a database the tests may write to,
//! except for the timeout test which needs no database.

use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use greenlight_core::{
    Filters, Language, NewMovie, NewUser, Runtime, TokenScope, Translation, DEFAULT_CATEGORY_ID,
};
use greenlight_store::{
    CategoryStore, ItemStore, MovieStore, PgStore, StoreConfig, StoreError, TokenStore, UserStore,
};

const SAFELIST: &[&str] = &["id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime"];

async fn store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(
        PgStore::connect(&url, StoreConfig::default())
            .await
            .expect("connect to DATABASE_URL"),
    )
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
async fn optimistic_movie_update() {
    let Some(store) = store().await else { return };

    let title = unique("Heat");
    let genre = unique("crime");
    let movie = store
        .insert_movie(&NewMovie {
            title: title.clone(),
            year: 1995,
            runtime: Runtime(170),
            genres: vec![genre.clone(), "drama".into()],
        })
        .await
        .unwrap();
    assert_eq!(movie.version, 1);

    let mut first = movie.clone();
    first.year = 1996;
    assert_eq!(store.update_movie(&first).await.unwrap(), 2);

    let mut stale = movie;
    stale.title = "stale".into();
    assert!(matches!(
        store.update_movie(&stale).await,
        Err(StoreError::EditConflict)
    ));

    let stored = store.get_movie(first.id).await.unwrap();
    assert_eq!(stored.title, title);
    assert_eq!(stored.version, 2);

    let filters = Filters {
        page: 1,
        page_size: 5,
        sort: "-year".into(),
        sort_safelist: SAFELIST,
    };
    let (found, meta) = store
        .list_movies("", &[genre], &filters)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(meta.total_records, 1);

    store.delete_movie(first.id).await.unwrap();
    assert!(matches!(
        store.delete_movie(first.id).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn translation_policies() {
    let Some(store) = store().await else { return };

    let cat = store
        .insert_category(&Translation::new(Language::En, unique("Drinks"), "d.png"))
        .await
        .unwrap();
    store
        .add_category_translation(cat.id, &Translation::new(Language::Ar, "مشروبات", "d.png"))
        .await
        .unwrap();
    assert!(matches!(
        store
            .add_category_translation(cat.id, &Translation::new(Language::Ar, "x", "x.png"))
            .await,
        Err(StoreError::DuplicateTranslation)
    ));

    let item = store
        .insert_item(cat.id, &Translation::new(Language::En, "Tea", "t.png"))
        .await
        .unwrap();
    let ar = Translation::new(Language::Ar, "شاي", "t.png");
    store.update_item(item.id, &ar, None).await.unwrap();
    let first = store.get_item(item.id, Language::Ar).await.unwrap();
    store.update_item(item.id, &ar, None).await.unwrap();
    store.update_item(item.id, &ar, Some(cat.id)).await.unwrap();
    let repeated = store.get_item(item.id, Language::Ar).await.unwrap();
    assert_eq!(first, repeated);
    assert_eq!(repeated.name, "شاي");

    assert!(matches!(
        store
            .update_item(item.id, &Translation::new(Language::Ar, "قهوة", "c.png"), Some(i64::MAX))
            .await,
        Err(StoreError::CategoryDoesNotExist)
    ));
    let unchanged = store.get_item(item.id, Language::Ar).await.unwrap();
    assert_eq!(unchanged.name, "شاي");
    assert_eq!(unchanged.category_id, cat.id);

    store.delete_category(cat.id).await.unwrap();
    assert_eq!(
        store.get_item(item.id, Language::En).await.unwrap().category_id,
        DEFAULT_CATEGORY_ID
    );
    assert!(matches!(
        store.delete_category(DEFAULT_CATEGORY_ID).await,
        Err(StoreError::CannotDeleteProtected)
    ));
    store.delete_item(item.id).await.unwrap();
}

#[tokio::test]
async fn users_and_tokens() {
    let Some(store) = store().await else { return };

    let email = format!("{}@example.com", unique("user"));
    let user = store
        .insert_user(&NewUser {
            name: "Test".into(),
            email: email.clone(),
            password_hash: "hash".into(),
        })
        .await
        .unwrap();
    assert!(matches!(
        store
            .insert_user(&NewUser {
                name: "Again".into(),
                email: email.to_uppercase(),
                password_hash: "hash".into(),
            })
            .await,
        Err(StoreError::DuplicateEmail)
    ));

    let token = store
        .new_token(user.id, Duration::hours(1), TokenScope::Activation)
        .await
        .unwrap();
    let owner = store
        .get_user_for_token(TokenScope::Activation, &token.plaintext)
        .await
        .unwrap();
    assert_eq!(owner.id, user.id);

    store
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await
        .unwrap();
    assert!(matches!(
        store
            .get_user_for_token(TokenScope::Activation, &token.plaintext)
            .await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn two_step_insert_without_transaction() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else { return };
    let store = PgStore::connect(
        &url,
        StoreConfig {
            atomic_translatable_insert: false,
            ..StoreConfig::default()
        },
    )
    .await
    .expect("connect to DATABASE_URL");

    let cat = store
        .insert_category(&Translation::new(Language::En, unique("Snacks"), "s.png"))
        .await
        .unwrap();
    assert_eq!(store.get_category(cat.id, Language::En).await.unwrap(), cat);

    let item = store
        .insert_item(cat.id, &Translation::new(Language::En, "Chips", "c.png"))
        .await
        .unwrap();
    assert_eq!(store.get_item(item.id, Language::En).await.unwrap(), item);

    assert!(matches!(
        store
            .insert_item(i64::MAX, &Translation::new(Language::En, "Ghost", "g.png"))
            .await,
        Err(StoreError::CategoryDoesNotExist)
    ));

    store.delete_category(cat.id).await.unwrap();
    store.delete_item(item.id).await.unwrap();
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    // Accepts connections and never answers the startup handshake.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect_lazy(&format!("postgres://greenlight:secret@{addr}/greenlight"))
        .unwrap();
    let store = PgStore::from_pool(
        pool,
        StoreConfig {
            query_timeout: std::time::Duration::from_millis(50),
            ..StoreConfig::default()
        },
    );

    assert!(matches!(store.get_movie(1).await, Err(StoreError::Timeout)));
    assert!(matches!(
        store.list_categories(Language::En).await,
        Err(StoreError::Timeout)
    ));

    server.abort();
}
