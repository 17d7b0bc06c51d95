//! Showtime entity and repository trait.
//!
//! A showtime is one screening of a movie in a hall. `ends_at` is always
//! `starts_at + movie.duration_minutes`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::booking::BookingStatus;
use super::hall::Seat;
use crate::domain::value_objects::Money;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShowtimeStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

impl ShowtimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for ShowtimeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(format!("Unknown showtime status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub hall_id: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub base_price: Money,
    pub status: ShowtimeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Showtime {
    pub fn is_scheduled(&self) -> bool {
        self.status == ShowtimeStatus::Scheduled
    }
}

/// Listing filter. `date` selects a UTC calendar day.
#[derive(Debug, Clone, Default)]
pub struct ShowtimeFilter {
    pub movie_id: Option<i64>,
    pub hall_id: Option<i64>,
    pub branch_id: Option<i64>,
    pub date: Option<NaiveDate>,
    /// Only scheduled showtimes starting after this instant
    pub upcoming_after: Option<DateTime<Utc>>,
}

/// Availability of one seat for one showtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatAvailability {
    Available,
    Held,
    Booked,
    Unavailable,
}

/// A seat claimed by an active booking.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatClaim {
    pub seat_id: i64,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
}

/// Work out a seat's availability from the active claims on it.
///
/// A pending claim past its deadline no longer blocks the seat even
/// before the sweeper has expired it.
pub fn seat_availability(seat: &Seat, claims: &[SeatClaim], now: DateTime<Utc>) -> SeatAvailability {
    if !seat.is_active {
        return SeatAvailability::Unavailable;
    }

    let mut availability = SeatAvailability::Available;
    for claim in claims.iter().filter(|c| c.seat_id == seat.id) {
        match claim.status {
            BookingStatus::Confirmed => return SeatAvailability::Booked,
            BookingStatus::Pending if claim.expires_at > now => {
                availability = SeatAvailability::Held;
            }
            _ => {}
        }
    }
    availability
}

#[async_trait]
pub trait ShowtimeRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Showtime>, AppError>;

    /// Showtimes matching the filter ordered by start time.
    async fn list(&self, filter: &ShowtimeFilter) -> Result<Vec<Showtime>, AppError>;

    /// Seats claimed by pending or confirmed bookings of the showtime.
    async fn seat_claims(&self, showtime_id: i64) -> Result<Vec<SeatClaim>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::hall::SeatType;
    use chrono::Duration;

    fn seat(id: i64, is_active: bool) -> Seat {
        Seat {
            id,
            hall_id: 1,
            row_label: "A".into(),
            number: id as i32,
            seat_type: SeatType::Standard,
            is_active,
        }
    }

    fn claim(seat_id: i64, status: BookingStatus, expires_in: i64) -> SeatClaim {
        SeatClaim {
            seat_id,
            status,
            expires_at: Utc::now() + Duration::minutes(expires_in),
        }
    }

    #[test]
    fn test_seat_availability() {
        let now = Utc::now();
        let claims = vec![
            claim(2, BookingStatus::Pending, 5),
            claim(3, BookingStatus::Confirmed, -60),
            claim(4, BookingStatus::Pending, -1),
        ];

        assert_eq!(seat_availability(&seat(1, true), &claims, now), SeatAvailability::Available);
        assert_eq!(seat_availability(&seat(2, true), &claims, now), SeatAvailability::Held);
        assert_eq!(seat_availability(&seat(3, true), &claims, now), SeatAvailability::Booked);
        assert_eq!(seat_availability(&seat(4, true), &claims, now), SeatAvailability::Available);
        assert_eq!(seat_availability(&seat(5, false), &claims, now), SeatAvailability::Unavailable);
    }
}
