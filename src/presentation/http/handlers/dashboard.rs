//! Admin Dashboard Handler

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::application::dto::request::DashboardQuery;
use crate::application::dto::response::DashboardResponse;
use crate::application::services::{DashboardService, DashboardServiceImpl};
use crate::infrastructure::repositories::PgReportRepository;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Sales summary for the trailing `?days=` window
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let service = DashboardServiceImpl::new(
        Arc::new(PgReportRepository::new(state.db.clone())),
        state.settings.booking.currency.clone(),
    );
    Ok(Json(service.summary(query, Utc::now()).await?))
}
