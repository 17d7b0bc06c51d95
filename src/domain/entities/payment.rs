//! Payment entity and repository trait.
//!
//! One payment row per provider intent. A booking can collect several
//! failed or cancelled attempts before one succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Money;
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending | Self::Succeeded)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("Unknown payment status '{}'", other)),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps to the `payments` table. `provider_payment_id` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub user_id: i64,
    pub amount: Money,
    /// "stripe" or "mock"
    pub provider: String,
    /// Provider intent id
    pub provider_payment_id: String,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub refund_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn mark_succeeded(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Succeeded;
        self.paid_at = Some(now);
        self.failure_reason = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, status: PaymentStatus, reason: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.failure_reason = reason;
        self.updated_at = now;
    }

    pub fn mark_refunded(&mut self, refund_id: String, now: DateTime<Utc>) {
        self.status = PaymentStatus::Refunded;
        self.refund_id = Some(refund_id);
        self.refunded_at = Some(now);
        self.updated_at = now;
    }
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, AppError>;

    async fn find_by_provider_id(&self, provider_payment_id: &str)
        -> Result<Option<Payment>, AppError>;

    /// Every attempt for a booking, oldest first.
    async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>, AppError>;

    /// Newest first, optionally restricted to one status.
    async fn list(&self, status: Option<PaymentStatus>, page: PageParams)
        -> Result<(Vec<Payment>, i64), AppError>;

    /// Insert or update by id.
    async fn save(&self, payment: &Payment) -> Result<(), AppError>;
}
