//! Booking entity and repository trait.
//!
//! A booking starts as a Pending hold on a set of seats and becomes
//! Confirmed once its payment succeeds.
//!
//! ```text
//! Pending --> Confirmed --> Cancelled
//!    |  \
//!    |   +--> Cancelled
//!    +------> Expired
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hall::SeatType;
use crate::domain::value_objects::Money;
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Pending, Expired) | (Confirmed, Cancelled)
        )
    }

    /// Whether the booking still occupies its seats.
    pub fn holds_seats(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(format!("Unknown booking status '{}'", other)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One seat of a booking with the price it was sold at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingSeat {
    pub seat_id: i64,
    pub row_label: String,
    pub number: i32,
    pub seat_type: SeatType,
    /// Minor units in the booking currency
    pub price: i64,
}

impl BookingSeat {
    pub fn label(&self) -> String {
        format!("{}{}", self.row_label, self.number)
    }
}

/// Maps to `bookings` plus its `booking_seats` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    /// Short human-facing reference, unique
    pub booking_code: String,
    pub user_id: i64,
    pub showtime_id: i64,
    pub status: BookingStatus,
    pub total: Money,
    pub seats: Vec<BookingSeat>,
    pub idempotency_key: Option<String>,
    /// Hold deadline while Pending
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Move to `next`, stamping the matching timestamp.
    pub fn transition(&mut self, next: BookingStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "Booking cannot go from {} to {}",
                self.status, next
            )));
        }
        match next {
            BookingStatus::Confirmed => self.confirmed_at = Some(now),
            BookingStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Pending and past its hold deadline.
    pub fn is_hold_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at <= now
    }

    pub fn seat_ids(&self) -> Vec<i64> {
        self.seats.iter().map(|s| s.seat_id).collect()
    }

    pub fn seat_labels(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.label()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<i64>,
    pub showtime_id: Option<i64>,
    pub status: Option<BookingStatus>,
}

/// A booking joined with what customer-facing messages need.
#[derive(Debug, Clone)]
pub struct BookingContext {
    pub booking: Booking,
    pub user_email: String,
    pub user_name: String,
    pub movie_id: i64,
    pub movie_title: String,
    pub hall_name: String,
    pub branch_name: String,
    pub starts_at: DateTime<Utc>,
}

/// Read-side booking access. Writes go through a `TransactionScope`.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError>;

    /// A user's earlier booking submitted with the same idempotency key.
    async fn find_by_idempotency_key(
        &self,
        user_id: i64,
        key: &str,
    ) -> Result<Option<Booking>, AppError>;

    /// Newest first.
    async fn list(&self, filter: &BookingFilter, page: PageParams)
        -> Result<(Vec<Booking>, i64), AppError>;

    async fn find_context(&self, id: i64) -> Result<Option<BookingContext>, AppError>;

    /// Whether the user holds a confirmed booking for any showtime of the movie.
    async fn has_confirmed_for_movie(&self, user_id: i64, movie_id: i64) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;
    use BookingStatus::*;

    #[test_case(Pending, Confirmed, true)]
    #[test_case(Pending, Cancelled, true)]
    #[test_case(Pending, Expired, true)]
    #[test_case(Confirmed, Cancelled, true)]
    #[test_case(Confirmed, Expired, false)]
    #[test_case(Confirmed, Pending, false)]
    #[test_case(Cancelled, Confirmed, false)]
    #[test_case(Expired, Confirmed, false)]
    #[test_case(Expired, Cancelled, false)]
    fn status_transitions(from: BookingStatus, to: BookingStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    fn booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: 1,
            booking_code: "ABCD2345".into(),
            user_id: 2,
            showtime_id: 3,
            status: Pending,
            total: Money::new(2500, "usd"),
            seats: vec![BookingSeat {
                seat_id: 10,
                row_label: "B".into(),
                number: 4,
                seat_type: SeatType::Standard,
                price: 2500,
            }],
            idempotency_key: None,
            expires_at: now + Duration::minutes(10),
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transition_stamps_timestamps() {
        let mut b = booking();
        let now = Utc::now();
        b.transition(Confirmed, now).unwrap();
        assert_eq!(b.confirmed_at, Some(now));

        b.transition(Cancelled, now).unwrap();
        assert_eq!(b.cancelled_at, Some(now));
        assert!(matches!(b.transition(Confirmed, now), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_hold_lapse() {
        let b = booking();
        assert!(!b.is_hold_lapsed(Utc::now()));
        assert!(b.is_hold_lapsed(Utc::now() + Duration::minutes(11)));
        assert_eq!(b.seat_labels(), vec!["B4".to_string()]);
    }
}
