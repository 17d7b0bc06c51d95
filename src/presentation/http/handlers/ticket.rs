//! Ticket Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;

use crate::application::dto::response::TicketResponse;
use crate::application::services::{TicketService, TicketServiceImpl};
use crate::infrastructure::repositories::PgTicketRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

fn service(state: &AppState) -> TicketServiceImpl<PgTicketRepository> {
    TicketServiceImpl::new(Arc::new(PgTicketRepository::new(state.db.clone())))
}

pub async fn list_my_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TicketResponse>>, AppError> {
    Ok(Json(service(&state).list_mine(auth.actor()).await?))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<Json<TicketResponse>, AppError> {
    Ok(Json(service(&state).get_by_code(auth.actor(), &code).await?))
}

/// Door scan
pub async fn check_in(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<TicketResponse>, AppError> {
    Ok(Json(service(&state).check_in(&code, Utc::now()).await?))
}
