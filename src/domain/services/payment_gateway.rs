//! Payment gateway port.
//!
//! Abstraction over the card processor. Implementations live in
//! `infrastructure::payments` (Stripe over HTTPS and an in-memory mock).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::value_objects::Money;
use crate::shared::error::AppError;

/// Provider-side state of a payment intent, collapsed to what the saga needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    /// Awaiting confirmation, customer action or processing
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: Money,
    pub status: IntentStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    IntentSucceeded,
    IntentFailed,
    IntentCanceled,
    Other(String),
}

/// A verified webhook notification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: WebhookEventKind,
    pub intent_id: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment intent not found: {0}")]
    NotFound(String),

    #[error("Invalid gateway request: {0}")]
    InvalidRequest(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Declined(reason) => AppError::PaymentRequired(reason),
            GatewayError::NotFound(id) => AppError::NotFound(format!("Payment intent {} not found", id)),
            GatewayError::InvalidSignature(msg) => AppError::BadRequest(msg),
            GatewayError::InvalidRequest(msg) | GatewayError::Unavailable(msg) => AppError::Upstream(msg),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name stored on payment rows.
    fn provider(&self) -> &'static str;

    async fn create_intent(
        &self,
        amount: &Money,
        metadata: &BTreeMap<String, String>,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    async fn refund(
        &self,
        intent_id: &str,
        amount: &Money,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayError>;

    /// Authenticate and decode an incoming webhook body.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, GatewayError>;
}
