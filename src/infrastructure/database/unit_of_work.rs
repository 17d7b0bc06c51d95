//! Unit of Work Pattern Implementation
//!
//! Provides transactional boundaries for the booking saga. Every method of
//! [`PgTransactionScope`] runs on the same PostgreSQL transaction, so the
//! writes of one saga step succeed or fail together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::domain::{
    Booking, BookingStatus, Hall, Payment, Showtime, ShowtimeStatus, Ticket, TicketStatus,
    TransactionScope, UnitOfWork,
};
use crate::infrastructure::repositories::booking_repository::{self, BookingRow, BOOKING_COLUMNS};
use crate::infrastructure::repositories::payment_repository::{
    upsert_payment, PaymentRow, PAYMENT_COLUMNS,
};
use crate::infrastructure::repositories::hall_repository::{HallRow, HALL_COLUMNS};
use crate::infrastructure::repositories::showtime_repository::{
    self, ShowtimeRow, SHOWTIME_COLUMNS,
};
use crate::shared::error::AppError;

/// Partial unique index guarding against double-sold seats.
const SEAT_UNIQUE_INDEX: &str = "uq_booking_seats_showtime_seat";

/// PostgreSQL Unit of Work implementation.
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    /// Create a new Unit of Work instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTransactionScope { tx: Some(tx) }))
    }
}

/// Transaction scope that wraps a SQLx transaction.
///
/// The transaction rolls back when the scope is dropped uncommitted.
pub struct PgTransactionScope {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransactionScope {
    fn conn(&mut self) -> Result<&mut PgConnection, AppError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(AppError::Internal("Transaction already finished".into())),
        }
    }
}

fn map_booking_insert_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return if db_err.constraint() == Some(SEAT_UNIQUE_INDEX) {
                AppError::Conflict("Some of the selected seats are no longer available".into())
            } else {
                AppError::Conflict("Duplicate booking request".into())
            };
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl TransactionScope for PgTransactionScope {
    async fn lock_showtime(&mut self, id: i64) -> Result<Option<Showtime>, AppError> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {} FROM showtimes s WHERE s.id = $1 FOR UPDATE",
            SHOWTIME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(ShowtimeRow::into_showtime).transpose()
    }

    async fn set_showtime_status(&mut self, id: i64, status: ShowtimeStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE showtimes SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn lock_hall(&mut self, id: i64) -> Result<Option<Hall>, AppError> {
        let row = sqlx::query_as::<_, HallRow>(&format!(
            "SELECT {} FROM halls WHERE id = $1 FOR UPDATE",
            HALL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(HallRow::into_hall).transpose()
    }

    async fn find_overlapping_showtimes(
        &mut self,
        hall_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Showtime>, AppError> {
        showtime_repository::find_overlapping(self.conn()?, hall_id, from, to).await
    }

    async fn insert_showtime(&mut self, showtime: &Showtime) -> Result<Showtime, AppError> {
        showtime_repository::insert_showtime(self.conn()?, showtime).await
    }

    async fn expire_stale_holds(
        &mut self,
        showtime_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError> {
        let expired = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE bookings
            SET status = 'expired', updated_at = $2
            WHERE status = 'pending'
              AND expires_at <= $2
              AND ($1::BIGINT IS NULL OR showtime_id = $1)
            RETURNING id
            "#,
        )
        .bind(showtime_id)
        .bind(now)
        .fetch_all(self.conn()?)
        .await?;

        if !expired.is_empty() {
            self.release_seats(&expired).await?;
        }

        Ok(expired)
    }

    async fn pending_bookings_for_showtime(&mut self, showtime_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM bookings WHERE showtime_id = $1 AND status = 'pending' FOR UPDATE",
        )
        .bind(showtime_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(ids)
    }

    async fn count_confirmed_bookings(&mut self, showtime_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings WHERE showtime_id = $1 AND status = 'confirmed'",
        )
        .bind(showtime_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(count)
    }

    async fn find_taken_seats(&mut self, showtime_id: i64, seat_ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let taken = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT bs.seat_id
            FROM booking_seats bs
            JOIN bookings b ON b.id = bs.booking_id
            WHERE bs.showtime_id = $1
              AND bs.is_active
              AND bs.seat_id = ANY($2)
              AND b.status IN ('pending', 'confirmed')
            "#,
        )
        .bind(showtime_id)
        .bind(seat_ids)
        .fetch_all(self.conn()?)
        .await?;
        Ok(taken)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        let conn = self.conn()?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, booking_code, user_id, showtime_id, status, total_amount,
                                  currency, idempotency_key, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_code)
        .bind(booking.user_id)
        .bind(booking.showtime_id)
        .bind(booking.status.as_str())
        .bind(booking.total.amount)
        .bind(&booking.total.currency)
        .bind(&booking.idempotency_key)
        .bind(booking.expires_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(map_booking_insert_error)?;

        let seat_ids: Vec<i64> = booking.seats.iter().map(|s| s.seat_id).collect();
        let labels: Vec<String> = booking.seats.iter().map(|s| s.row_label.clone()).collect();
        let numbers: Vec<i32> = booking.seats.iter().map(|s| s.number).collect();
        let types: Vec<String> = booking
            .seats
            .iter()
            .map(|s| s.seat_type.as_str().to_string())
            .collect();
        let prices: Vec<i64> = booking.seats.iter().map(|s| s.price).collect();

        sqlx::query(
            r#"
            INSERT INTO booking_seats (booking_id, showtime_id, seat_id, row_label, number,
                                       seat_type, price)
            SELECT $1, $2, seat_id, row_label, number, seat_type, price
            FROM UNNEST($3::BIGINT[], $4::VARCHAR[], $5::INT[], $6::VARCHAR[], $7::BIGINT[])
                 AS s(seat_id, row_label, number, seat_type, price)
            "#,
        )
        .bind(booking.id)
        .bind(booking.showtime_id)
        .bind(&seat_ids)
        .bind(&labels)
        .bind(&numbers)
        .bind(&types)
        .bind(&prices)
        .execute(&mut *conn)
        .await
        .map_err(map_booking_insert_error)?;

        Ok(())
    }

    async fn lock_booking(&mut self, id: i64) -> Result<Option<Booking>, AppError> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings b WHERE b.id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(booking_repository::hydrate(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2,
                updated_at = $3,
                confirmed_at = CASE WHEN $2 = 'confirmed' THEN $3 ELSE confirmed_at END,
                cancelled_at = CASE WHEN $2 = 'cancelled' THEN $3 ELSE cancelled_at END
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .bind(status.as_str())
        .bind(at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn release_seats(&mut self, booking_ids: &[i64]) -> Result<(), AppError> {
        sqlx::query("UPDATE booking_seats SET is_active = FALSE WHERE booking_id = ANY($1) AND is_active")
            .bind(booking_ids)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        upsert_payment(self.conn()?, payment).await
    }

    async fn cancel_pending_payments(
        &mut self,
        booking_ids: &[i64],
        at: DateTime<Utc>,
    ) -> Result<Vec<Payment>, AppError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = 'cancelled', updated_at = $2
            WHERE booking_id = ANY($1) AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(booking_ids)
        .bind(at)
        .fetch_all(self.conn()?)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn insert_tickets(&mut self, tickets: &[Ticket]) -> Result<(), AppError> {
        let ids: Vec<i64> = tickets.iter().map(|t| t.id).collect();
        let codes: Vec<String> = tickets.iter().map(|t| t.ticket_code.clone()).collect();
        let booking_ids: Vec<i64> = tickets.iter().map(|t| t.booking_id).collect();
        let showtime_ids: Vec<i64> = tickets.iter().map(|t| t.showtime_id).collect();
        let seat_ids: Vec<i64> = tickets.iter().map(|t| t.seat_id).collect();
        let user_ids: Vec<i64> = tickets.iter().map(|t| t.user_id).collect();
        let issued: Vec<DateTime<Utc>> = tickets.iter().map(|t| t.issued_at).collect();

        sqlx::query(
            r#"
            INSERT INTO tickets (id, ticket_code, booking_id, showtime_id, seat_id, user_id,
                                 status, issued_at)
            SELECT id, ticket_code, booking_id, showtime_id, seat_id, user_id, 'valid', issued_at
            FROM UNNEST($1::BIGINT[], $2::VARCHAR[], $3::BIGINT[], $4::BIGINT[], $5::BIGINT[],
                        $6::BIGINT[], $7::TIMESTAMPTZ[])
                 AS t(id, ticket_code, booking_id, showtime_id, seat_id, user_id, issued_at)
            "#,
        )
        .bind(&ids)
        .bind(&codes)
        .bind(&booking_ids)
        .bind(&showtime_ids)
        .bind(&seat_ids)
        .bind(&user_ids)
        .bind(&issued)
        .execute(self.conn()?)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Tickets were already issued for this booking"))?;

        Ok(())
    }

    async fn set_ticket_statuses(&mut self, booking_id: i64, status: TicketStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE tickets SET status = $2 WHERE booking_id = $1")
            .bind(booking_id)
            .bind(status.as_str())
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::Internal("Transaction already finished".into())),
        }
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}
