//! Genre Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::GenreRequest;
use crate::application::dto::response::GenreResponse;
use crate::application::services::{GenreService, GenreServiceImpl};
use crate::infrastructure::repositories::PgGenreRepository;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

fn service(state: &AppState) -> GenreServiceImpl<PgGenreRepository> {
    GenreServiceImpl::new(
        Arc::new(PgGenreRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.cache.clone(),
    )
}

pub async fn list_genres(State(state): State<AppState>) -> Result<Json<Vec<GenreResponse>>, AppError> {
    Ok(Json(service(&state).list().await?))
}

pub async fn create_genre(
    State(state): State<AppState>,
    Json(body): Json<GenreRequest>,
) -> Result<(StatusCode, Json<GenreResponse>), AppError> {
    let genre = service(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn update_genre(
    State(state): State<AppState>,
    Path(genre_id): Path<String>,
    Json(body): Json<GenreRequest>,
) -> Result<Json<GenreResponse>, AppError> {
    let genre_id = parse_id(&genre_id, "genre")?;
    Ok(Json(service(&state).update(genre_id, body).await?))
}

/// Delete a genre; movies keep their other genres
pub async fn delete_genre(
    State(state): State<AppState>,
    Path(genre_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let genre_id = parse_id(&genre_id, "genre")?;
    service(&state).delete(genre_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
