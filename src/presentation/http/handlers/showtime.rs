//! Showtime Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::application::dto::request::{CreateShowtimeRequest, ShowtimeListQuery};
use crate::application::dto::response::{SeatMapResponse, ShowtimeResponse};
use crate::application::services::{ShowtimeService, ShowtimeServiceImpl};
use crate::infrastructure::database::PgUnitOfWork;
use crate::infrastructure::repositories::{PgHallRepository, PgMovieRepository, PgShowtimeRepository};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

fn service(state: &AppState) -> ShowtimeServiceImpl<PgShowtimeRepository, PgMovieRepository, PgHallRepository> {
    ShowtimeServiceImpl::new(
        Arc::new(PgShowtimeRepository::new(state.db.clone())),
        Arc::new(PgMovieRepository::new(state.db.clone())),
        Arc::new(PgHallRepository::new(state.db.clone())),
        Arc::new(PgUnitOfWork::new(state.db.clone())),
        state.payments.clone(),
        state.settings.booking.clone(),
        state.snowflake.clone(),
    )
}

pub async fn list_showtimes(
    State(state): State<AppState>,
    Query(query): Query<ShowtimeListQuery>,
) -> Result<Json<Vec<ShowtimeResponse>>, AppError> {
    Ok(Json(service(&state).list(query).await?))
}

pub async fn get_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
) -> Result<Json<ShowtimeResponse>, AppError> {
    let showtime_id = parse_id(&showtime_id, "showtime")?;
    Ok(Json(service(&state).get(showtime_id).await?))
}

/// Seat grid with prices and live availability
pub async fn seat_map(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
) -> Result<Json<SeatMapResponse>, AppError> {
    let showtime_id = parse_id(&showtime_id, "showtime")?;
    Ok(Json(service(&state).seat_map(showtime_id, Utc::now()).await?))
}

pub async fn create_showtime(
    State(state): State<AppState>,
    Json(body): Json<CreateShowtimeRequest>,
) -> Result<(StatusCode, Json<ShowtimeResponse>), AppError> {
    let showtime = service(&state).create(body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(showtime)))
}

/// Cancel a showtime; pending holds on it are dropped
pub async fn cancel_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
) -> Result<Json<ShowtimeResponse>, AppError> {
    let showtime_id = parse_id(&showtime_id, "showtime")?;
    Ok(Json(service(&state).cancel(showtime_id, Utc::now()).await?))
}
