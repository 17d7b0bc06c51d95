//! Payment Handlers
//!
//! Payment intents, client-side confirmation, the provider webhook and
//! admin refunds.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;

use crate::application::dto::request::{CreatePaymentRequest, PaymentListQuery};
use crate::application::dto::response::{PaymentConfirmationResponse, PaymentResponse, WebhookAck};
use crate::application::services::{PaymentService, PaymentServiceImpl};
use crate::infrastructure::database::PgUnitOfWork;
use crate::infrastructure::repositories::{PgBookingRepository, PgPaymentRepository, PgTicketRepository};
use crate::presentation::http::extractors::IdempotencyKey;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

fn service(state: &AppState) -> PaymentServiceImpl<PgBookingRepository, PgPaymentRepository, PgTicketRepository> {
    PaymentServiceImpl::new(
        Arc::new(PgBookingRepository::new(state.db.clone())),
        Arc::new(PgPaymentRepository::new(state.db.clone())),
        Arc::new(PgTicketRepository::new(state.db.clone())),
        Arc::new(PgUnitOfWork::new(state.db.clone())),
        state.payments.clone(),
        state.email.clone(),
        state.snowflake.clone(),
    )
}

/// Create (or reuse) the payment intent for a pending booking
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    key: IdempotencyKey,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let payment = service(&state)
        .create_intent(auth.actor(), body, key.into_inner(), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment_id = parse_id(&payment_id, "payment")?;
    Ok(Json(service(&state).get(auth.actor(), payment_id).await?))
}

/// Settle a payment after the client finished the provider flow
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentConfirmationResponse>, AppError> {
    let payment_id = parse_id(&payment_id, "payment")?;
    Ok(Json(service(&state).confirm(auth.actor(), payment_id, Utc::now()).await?))
}

/// Provider webhook. The body must reach the signature check untouched.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".into()))?;

    Ok(Json(service(&state).handle_webhook(&body, signature, Utc::now()).await?))
}

pub async fn admin_list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Page<PaymentResponse>>, AppError> {
    Ok(Json(service(&state).admin_list(query).await?))
}

/// Refund a succeeded payment and cancel its booking
pub async fn admin_refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment_id = parse_id(&payment_id, "payment")?;
    Ok(Json(service(&state).admin_refund(payment_id, Utc::now()).await?))
}
