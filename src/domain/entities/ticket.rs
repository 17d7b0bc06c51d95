//! Ticket entity and repository trait.
//!
//! Tickets are issued once per booked seat when the payment is finalised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Valid,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Unknown ticket status '{}'", other)),
        }
    }
}

/// Maps to `tickets`. `(booking_id, seat_id)` and `ticket_code` are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub ticket_code: String,
    pub booking_id: i64,
    pub showtime_id: i64,
    pub seat_id: i64,
    pub user_id: i64,
    pub status: TicketStatus,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// A ticket with the details printed on it.
#[derive(Debug, Clone)]
pub struct TicketView {
    pub ticket: Ticket,
    pub movie_title: String,
    pub branch_name: String,
    pub hall_name: String,
    pub row_label: String,
    pub seat_number: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// A user's tickets, soonest showtime first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<TicketView>, AppError>;

    async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Ticket>, AppError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<TicketView>, AppError>;

    /// Flip a Valid ticket to Used. Returns false when it was not Valid.
    async fn mark_used(&self, id: i64, at: DateTime<Utc>) -> Result<bool, AppError>;
}
