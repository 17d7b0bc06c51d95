//! Movie Handlers
//!
//! Catalog browsing, per-movie showtimes and reviews, plus admin CRUD.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    CreateMovieRequest, CreateReviewRequest, MovieListQuery, UpdateMovieRequest, UpdateReviewRequest,
};
use crate::application::dto::response::{
    MovieDetailResponse, MovieResponse, ReviewResponse, ShowtimeResponse,
};
use crate::application::services::{MovieService, MovieServiceImpl, ReviewService, ReviewServiceImpl};
use crate::infrastructure::repositories::{
    PgBookingRepository, PgGenreRepository, PgMovieRepository, PgReviewRepository,
    PgShowtimeRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageParams};
use crate::shared::validation::parse_id;
use crate::startup::AppState;

fn service(state: &AppState) -> MovieServiceImpl<PgMovieRepository, PgGenreRepository, PgShowtimeRepository> {
    MovieServiceImpl::new(
        Arc::new(PgMovieRepository::new(state.db.clone())),
        Arc::new(PgGenreRepository::new(state.db.clone())),
        Arc::new(PgShowtimeRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.cache.clone(),
        state.settings.cache.catalog_ttl_seconds,
    )
}

fn reviews(state: &AppState) -> ReviewServiceImpl<PgReviewRepository, PgMovieRepository, PgBookingRepository> {
    ReviewServiceImpl::new(
        Arc::new(PgReviewRepository::new(state.db.clone())),
        Arc::new(PgMovieRepository::new(state.db.clone())),
        Arc::new(PgBookingRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

/// Search, filter and sort the catalog
pub async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<MovieListQuery>,
) -> Result<Json<Page<MovieResponse>>, AppError> {
    Ok(Json(service(&state).list(query).await?))
}

pub async fn now_showing(State(state): State<AppState>) -> Result<Json<Vec<MovieResponse>>, AppError> {
    Ok(Json(service(&state).now_showing().await?))
}

pub async fn coming_soon(State(state): State<AppState>) -> Result<Json<Vec<MovieResponse>>, AppError> {
    Ok(Json(service(&state).coming_soon().await?))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<MovieDetailResponse>, AppError> {
    let movie_id = parse_id(&movie_id, "movie")?;
    Ok(Json(service(&state).get(movie_id).await?))
}

pub async fn movie_showtimes(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Vec<ShowtimeResponse>>, AppError> {
    let movie_id = parse_id(&movie_id, "movie")?;
    Ok(Json(service(&state).upcoming_showtimes(movie_id).await?))
}

pub async fn create_movie(
    State(state): State<AppState>,
    Json(body): Json<CreateMovieRequest>,
) -> Result<(StatusCode, Json<MovieResponse>), AppError> {
    let movie = service(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    Json(body): Json<UpdateMovieRequest>,
) -> Result<Json<MovieResponse>, AppError> {
    let movie_id = parse_id(&movie_id, "movie")?;
    Ok(Json(service(&state).update(movie_id, body).await?))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let movie_id = parse_id(&movie_id, "movie")?;
    service(&state).delete(movie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Reviews ------------------------------------------------------------

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ReviewResponse>>, AppError> {
    let movie_id = parse_id(&movie_id, "movie")?;
    Ok(Json(reviews(&state).list_by_movie(movie_id, page).await?))
}

/// Review a movie the caller has a confirmed booking for
pub async fn create_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(movie_id): Path<String>,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let movie_id = parse_id(&movie_id, "movie")?;
    let review = reviews(&state).create(auth.actor(), movie_id, body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(review_id): Path<String>,
    Json(body): Json<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let review_id = parse_id(&review_id, "review")?;
    Ok(Json(reviews(&state).update(auth.actor(), review_id, body).await?))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(review_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let review_id = parse_id(&review_id, "review")?;
    reviews(&state).delete(auth.actor(), review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
