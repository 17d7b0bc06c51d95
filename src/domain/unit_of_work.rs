//! Unit of Work contracts.
//!
//! The booking saga needs several writes to land atomically (a booking and
//! its seats, a payment and the tickets it pays for). A `TransactionScope`
//! exposes exactly those writes on one database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entities::{
    Booking, BookingStatus, Hall, Payment, Showtime, ShowtimeStatus, Ticket, TicketStatus,
};
use crate::shared::error::AppError;

/// Factory for transaction scopes.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, AppError>;
}

/// One open transaction.
///
/// Dropping a scope without calling [`TransactionScope::commit`] rolls it back.
#[async_trait]
pub trait TransactionScope: Send {
    /// Load and row-lock a showtime (`SELECT ... FOR UPDATE`).
    async fn lock_showtime(&mut self, id: i64) -> Result<Option<Showtime>, AppError>;

    async fn set_showtime_status(&mut self, id: i64, status: ShowtimeStatus) -> Result<(), AppError>;

    /// Load and row-lock a hall. Scheduling into a hall holds this lock
    /// from the overlap check until the insert commits.
    async fn lock_hall(&mut self, id: i64) -> Result<Option<Hall>, AppError>;

    /// Non-cancelled showtimes of a hall running at any point in `[from, to)`.
    async fn find_overlapping_showtimes(
        &mut self,
        hall_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Showtime>, AppError>;

    async fn insert_showtime(&mut self, showtime: &Showtime) -> Result<Showtime, AppError>;

    /// Move Pending bookings past their deadline to Expired and release their
    /// seats, optionally for one showtime only. Returns the ids that expired.
    async fn expire_stale_holds(
        &mut self,
        showtime_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError>;

    /// Ids of Pending bookings for a showtime.
    async fn pending_bookings_for_showtime(&mut self, showtime_id: i64) -> Result<Vec<i64>, AppError>;

    async fn count_confirmed_bookings(&mut self, showtime_id: i64) -> Result<i64, AppError>;

    /// Which of `seat_ids` are held or sold for the showtime.
    async fn find_taken_seats(&mut self, showtime_id: i64, seat_ids: &[i64]) -> Result<Vec<i64>, AppError>;

    /// Insert a booking with its seat rows. A seat already held or sold
    /// yields `AppError::Conflict`.
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError>;

    /// Load and row-lock a booking.
    async fn lock_booking(&mut self, id: i64) -> Result<Option<Booking>, AppError>;

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Free the seats of the given bookings for resale.
    async fn release_seats(&mut self, booking_ids: &[i64]) -> Result<(), AppError>;

    /// Insert or update a payment by id.
    async fn save_payment(&mut self, payment: &Payment) -> Result<(), AppError>;

    /// Cancel every Pending payment of the given bookings, returning them.
    async fn cancel_pending_payments(
        &mut self,
        booking_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<Vec<Payment>, AppError>;

    async fn insert_tickets(&mut self, tickets: &[Ticket]) -> Result<(), AppError>;

    async fn set_ticket_statuses(&mut self, booking_id: i64, status: TicketStatus) -> Result<(), AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;

    async fn rollback(&mut self) -> Result<(), AppError>;
}
