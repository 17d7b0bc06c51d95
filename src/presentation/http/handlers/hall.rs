//! Hall Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{CreateHallRequest, UpdateHallRequest, UpdateSeatRequest};
use crate::application::dto::response::{HallDetailResponse, HallResponse, SeatResponse};
use crate::application::services::{HallService, HallServiceImpl};
use crate::infrastructure::repositories::{PgBranchRepository, PgHallRepository};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

fn service(state: &AppState) -> HallServiceImpl<PgHallRepository, PgBranchRepository> {
    HallServiceImpl::new(
        Arc::new(PgHallRepository::new(state.db.clone())),
        Arc::new(PgBranchRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

/// Hall with its full seat grid
pub async fn get_hall(
    State(state): State<AppState>,
    Path(hall_id): Path<String>,
) -> Result<Json<HallDetailResponse>, AppError> {
    let hall_id = parse_id(&hall_id, "hall")?;
    Ok(Json(service(&state).get_with_seats(hall_id).await?))
}

/// Create a hall and generate its seats
pub async fn create_hall(
    State(state): State<AppState>,
    Json(body): Json<CreateHallRequest>,
) -> Result<(StatusCode, Json<HallDetailResponse>), AppError> {
    let hall = service(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(hall)))
}

pub async fn update_hall(
    State(state): State<AppState>,
    Path(hall_id): Path<String>,
    Json(body): Json<UpdateHallRequest>,
) -> Result<Json<HallResponse>, AppError> {
    let hall_id = parse_id(&hall_id, "hall")?;
    Ok(Json(service(&state).update(hall_id, body).await?))
}

pub async fn delete_hall(
    State(state): State<AppState>,
    Path(hall_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let hall_id = parse_id(&hall_id, "hall")?;
    service(&state).delete(hall_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_seat(
    State(state): State<AppState>,
    Path((hall_id, seat_id)): Path<(String, String)>,
    Json(body): Json<UpdateSeatRequest>,
) -> Result<Json<SeatResponse>, AppError> {
    let hall_id = parse_id(&hall_id, "hall")?;
    let seat_id = parse_id(&seat_id, "seat")?;
    Ok(Json(service(&state).update_seat(hall_id, seat_id, body).await?))
}
