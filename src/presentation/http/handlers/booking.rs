//! Booking Handlers
//!
//! Seat holds for the caller and the admin booking list.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::application::dto::request::{BookingListQuery, CreateBookingRequest};
use crate::application::dto::response::BookingResponse;
use crate::application::services::{BookingService, BookingServiceImpl};
use crate::infrastructure::database::PgUnitOfWork;
use crate::infrastructure::repositories::{
    PgBookingRepository, PgHallRepository, PgPaymentRepository, PgShowtimeRepository,
};
use crate::presentation::http::extractors::IdempotencyKey;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Set on responses that replay an earlier request with the same key.
pub const IDEMPOTENT_REPLAYED: HeaderName = HeaderName::from_static("idempotent-replayed");

type PgBookingService =
    BookingServiceImpl<PgShowtimeRepository, PgHallRepository, PgBookingRepository, PgPaymentRepository>;

pub(crate) fn service(state: &AppState) -> PgBookingService {
    BookingServiceImpl::new(
        Arc::new(PgShowtimeRepository::new(state.db.clone())),
        Arc::new(PgHallRepository::new(state.db.clone())),
        Arc::new(PgBookingRepository::new(state.db.clone())),
        Arc::new(PgPaymentRepository::new(state.db.clone())),
        Arc::new(PgUnitOfWork::new(state.db.clone())),
        state.payments.clone(),
        state.email.clone(),
        state.settings.booking.clone(),
        state.snowflake.clone(),
    )
}

/// Hold seats for a showtime.
///
/// 201 for a new hold, 200 with `Idempotent-Replayed: true` when the key
/// was already used by the caller.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    key: IdempotencyKey,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    let created = service(&state)
        .create_booking(auth.actor(), body, key.into_inner(), Utc::now())
        .await?;

    if created.replayed {
        let headers = [(IDEMPOTENT_REPLAYED, HeaderValue::from_static("true"))];
        return Ok((StatusCode::OK, headers, Json(created.booking)).into_response());
    }
    Ok((StatusCode::CREATED, Json(created.booking)).into_response())
}

pub async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Page<BookingResponse>>, AppError> {
    Ok(Json(service(&state).list_mine(auth.actor(), query).await?))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking_id = parse_id(&booking_id, "booking")?;
    Ok(Json(service(&state).get(auth.actor(), booking_id).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking_id = parse_id(&booking_id, "booking")?;
    Ok(Json(service(&state).cancel(auth.actor(), booking_id, Utc::now()).await?))
}

pub async fn admin_list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Page<BookingResponse>>, AppError> {
    Ok(Json(service(&state).admin_list(query).await?))
}
