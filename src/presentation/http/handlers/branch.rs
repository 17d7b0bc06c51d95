//! Branch Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{BranchListQuery, CreateBranchRequest, UpdateBranchRequest};
use crate::application::dto::response::{BranchResponse, HallResponse};
use crate::application::services::{BranchService, BranchServiceImpl};
use crate::infrastructure::repositories::{PgBranchRepository, PgHallRepository};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

fn service(state: &AppState) -> BranchServiceImpl<PgBranchRepository, PgHallRepository> {
    BranchServiceImpl::new(
        Arc::new(PgBranchRepository::new(state.db.clone())),
        Arc::new(PgHallRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

/// Active branches, `?city=` filters
pub async fn list_branches(
    State(state): State<AppState>,
    Query(query): Query<BranchListQuery>,
) -> Result<Json<Vec<BranchResponse>>, AppError> {
    Ok(Json(service(&state).list(query).await?))
}

pub async fn get_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<String>,
) -> Result<Json<BranchResponse>, AppError> {
    let branch_id = parse_id(&branch_id, "branch")?;
    Ok(Json(service(&state).get(branch_id).await?))
}

pub async fn list_branch_halls(
    State(state): State<AppState>,
    Path(branch_id): Path<String>,
) -> Result<Json<Vec<HallResponse>>, AppError> {
    let branch_id = parse_id(&branch_id, "branch")?;
    Ok(Json(service(&state).list_halls(branch_id).await?))
}

pub async fn create_branch(
    State(state): State<AppState>,
    Json(body): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<BranchResponse>), AppError> {
    let branch = service(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

pub async fn update_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<String>,
    Json(body): Json<UpdateBranchRequest>,
) -> Result<Json<BranchResponse>, AppError> {
    let branch_id = parse_id(&branch_id, "branch")?;
    Ok(Json(service(&state).update(branch_id, body).await?))
}

pub async fn delete_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let branch_id = parse_id(&branch_id, "branch")?;
    service(&state).delete(branch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
