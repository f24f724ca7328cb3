//! Movie handlers.
//!
//! Every route here requires an activated user.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use greenlight_core::{validate_filters, Filters, Metadata, Movie, NewMovie, Runtime, Validator};

use crate::auth::ActiveUser;
use crate::error::ApiError;
use crate::handlers::{json_body, parse_id, read_csv, read_int, read_string};
use crate::state::AppState;

/// Sort keys accepted by the list endpoint.
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// Header carrying the version a client expects to overwrite.
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// Single movie envelope.
#[derive(Debug, Serialize)]
pub struct MovieResponse {
    /// The movie.
    pub movie: Movie,
}

/// Page of movies.
#[derive(Debug, Serialize)]
pub struct ListMoviesResponse {
    /// Movies on this page.
    pub movies: Vec<Movie>,
    /// Pagination details.
    pub metadata: Metadata,
}

/// Message-only response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human readable outcome.
    pub message: String,
}

/// Partial movie update. Absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMovieRequest {
    /// New title.
    pub title: Option<String>,
    /// New release year.
    pub year: Option<i32>,
    /// New runtime, as `"<n> mins"`.
    pub runtime: Option<Runtime>,
    /// New genre list.
    pub genres: Option<Vec<String>>,
}

/// Create a movie.
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    ActiveUser(user): ActiveUser,
    payload: Result<Json<NewMovie>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;

    let mut v = Validator::new();
    input.validate(&mut v);
    v.finish()?;

    let movie = state.store.insert_movie(&input).await?;

    tracing::info!(movie_id = movie.id, user_id = user.id, "Movie created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/movies/{}", movie.id))],
        Json(MovieResponse { movie }),
    ))
}

/// Fetch a movie.
pub async fn show_movie(
    State(state): State<Arc<AppState>>,
    _user: ActiveUser,
    Path(id): Path<String>,
) -> Result<Json<MovieResponse>, ApiError> {
    let id = parse_id(&id)?;
    let movie = state.store.get_movie(id).await?;
    Ok(Json(MovieResponse { movie }))
}

/// List movies with optional title and genre filters.
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    _user: ActiveUser,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ListMoviesResponse>, ApiError> {
    let mut v = Validator::new();

    let title = read_string(&query, "title", "");
    let genres = read_csv(&query, "genres");
    let filters = Filters {
        page: read_int(&query, "page", 1, &mut v),
        page_size: read_int(&query, "page_size", 20, &mut v),
        sort: read_string(&query, "sort", "id"),
        sort_safelist: MOVIE_SORT_SAFELIST,
    };

    validate_filters(&mut v, &filters);
    v.finish()?;

    let (movies, metadata) = state.store.list_movies(&title, &genres, &filters).await?;
    Ok(Json(ListMoviesResponse { movies, metadata }))
}

/// Apply a partial update under optimistic concurrency.
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    ActiveUser(user): ActiveUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpdateMovieRequest>, JsonRejection>,
) -> Result<Json<MovieResponse>, ApiError> {
    let id = parse_id(&id)?;
    let mut movie = state.store.get_movie(id).await?;

    if let Some(expected) = headers
        .get(EXPECTED_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if expected.trim() != movie.version.to_string() {
            return Err(ApiError::EditConflict);
        }
    }

    let input = json_body(payload)?;
    if let Some(title) = input.title {
        movie.title = title;
    }
    if let Some(year) = input.year {
        movie.year = year;
    }
    if let Some(runtime) = input.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        movie.genres = genres;
    }

    let mut v = Validator::new();
    NewMovie::from(&movie).validate(&mut v);
    v.finish()?;

    movie.version = state.store.update_movie(&movie).await?;

    tracing::info!(movie_id = movie.id, version = movie.version, user_id = user.id, "Movie updated");

    Ok(Json(MovieResponse { movie }))
}

/// Delete a movie.
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    ActiveUser(user): ActiveUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete_movie(id).await?;

    tracing::info!(movie_id = id, user_id = user.id, "Movie deleted");

    Ok(Json(MessageResponse {
        message: "movie successfully deleted".to_string(),
    }))
}
