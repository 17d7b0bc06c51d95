//! Booking Repository Implementation
//!
//! Read side of bookings. Rows from `bookings` are stitched together with
//! their `booking_seats`; writes go through `PgTransactionScope`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{
    Booking, BookingContext, BookingFilter, BookingRepository, BookingSeat, BookingStatus, Money,
    SeatType,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: i64,
    booking_code: String,
    user_id: i64,
    showtime_id: i64,
    status: String,
    total_amount: i64,
    currency: String,
    idempotency_key: Option<String>,
    expires_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    pub(crate) fn into_booking(self, seats: Vec<BookingSeat>) -> Result<Booking, AppError> {
        let status: BookingStatus = self.status.parse().map_err(AppError::Internal)?;
        Ok(Booking {
            id: self.id,
            booking_code: self.booking_code,
            user_id: self.user_id,
            showtime_id: self.showtime_id,
            status,
            total: Money::new(self.total_amount, self.currency),
            seats,
            idempotency_key: self.idempotency_key,
            expires_at: self.expires_at,
            confirmed_at: self.confirmed_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingSeatRow {
    booking_id: i64,
    seat_id: i64,
    row_label: String,
    number: i32,
    seat_type: String,
    price: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BookingContextRow {
    user_email: String,
    user_name: String,
    movie_id: i64,
    movie_title: String,
    hall_name: String,
    branch_name: String,
    starts_at: DateTime<Utc>,
}

pub(crate) const BOOKING_COLUMNS: &str = "b.id, b.booking_code, b.user_id, b.showtime_id, \
     b.status, b.total_amount, b.currency, b.idempotency_key, b.expires_at, b.confirmed_at, \
     b.cancelled_at, b.created_at, b.updated_at";

/// Seat rows of the given bookings, keyed by booking id.
pub(crate) async fn load_seats(
    conn: &mut PgConnection,
    booking_ids: &[i64],
) -> Result<HashMap<i64, Vec<BookingSeat>>, AppError> {
    let rows = sqlx::query_as::<_, BookingSeatRow>(
        r#"
        SELECT booking_id, seat_id, row_label, number, seat_type, price
        FROM booking_seats
        WHERE booking_id = ANY($1)
        ORDER BY row_label, number
        "#,
    )
    .bind(booking_ids)
    .fetch_all(conn)
    .await?;

    let mut seats: HashMap<i64, Vec<BookingSeat>> = HashMap::new();
    for row in rows {
        let seat_type: SeatType = row.seat_type.parse().map_err(AppError::Internal)?;
        seats.entry(row.booking_id).or_default().push(BookingSeat {
            seat_id: row.seat_id,
            row_label: row.row_label,
            number: row.number,
            seat_type,
            price: row.price,
        });
    }
    Ok(seats)
}

/// Attach seat rows to a batch of booking rows, preserving order.
pub(crate) async fn hydrate(
    conn: &mut PgConnection,
    rows: Vec<BookingRow>,
) -> Result<Vec<Booking>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut seats = load_seats(conn, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let booking_seats = seats.remove(&row.id).unwrap_or_default();
            row.into_booking(booking_seats)
        })
        .collect()
}

/// PostgreSQL booking repository implementation.
#[derive(Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        bind_a: i64,
        bind_b: Option<&str>,
    ) -> Result<Option<Booking>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {} FROM bookings b WHERE {}", BOOKING_COLUMNS, clause);
        let mut query = sqlx::query_as::<_, BookingRow>(&sql).bind(bind_a);
        if let Some(b) = bind_b {
            query = query.bind(b);
        }
        let row = query.fetch_optional(&mut *conn).await?;

        match row {
            Some(row) => Ok(hydrate(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError> {
        self.fetch_one_where("b.id = $1", id, None).await
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: i64,
        key: &str,
    ) -> Result<Option<Booking>, AppError> {
        self.fetch_one_where("b.user_id = $1 AND b.idempotency_key = $2", user_id, Some(key))
            .await
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageParams,
    ) -> Result<(Vec<Booking>, i64), AppError> {
        let mut conn = self.pool.acquire().await?;
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings b
            WHERE ($1::BIGINT IS NULL OR b.user_id = $1)
              AND ($2::BIGINT IS NULL OR b.showtime_id = $2)
              AND ($3::TEXT IS NULL OR b.status = $3)
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT $4 OFFSET $5
            "#,
            BOOKING_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.showtime_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM bookings b
            WHERE ($1::BIGINT IS NULL OR b.user_id = $1)
              AND ($2::BIGINT IS NULL OR b.showtime_id = $2)
              AND ($3::TEXT IS NULL OR b.status = $3)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.showtime_id)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;

        let bookings = hydrate(&mut conn, rows).await?;
        Ok((bookings, total))
    }

    async fn find_context(&self, id: i64) -> Result<Option<BookingContext>, AppError> {
        let Some(booking) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, BookingContextRow>(
            r#"
            SELECT u.email AS user_email, u.full_name AS user_name,
                   m.id AS movie_id, m.title AS movie_title, h.name AS hall_name,
                   br.name AS branch_name, s.starts_at
            FROM bookings b
            JOIN users u ON u.id = b.user_id
            JOIN showtimes s ON s.id = b.showtime_id
            JOIN movies m ON m.id = s.movie_id
            JOIN halls h ON h.id = s.hall_id
            JOIN branches br ON br.id = h.branch_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| BookingContext {
            booking,
            user_email: r.user_email,
            user_name: r.user_name,
            movie_id: r.movie_id,
            movie_title: r.movie_title,
            hall_name: r.hall_name,
            branch_name: r.branch_name,
            starts_at: r.starts_at,
        }))
    }

    async fn has_confirmed_for_movie(&self, user_id: i64, movie_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM bookings b
                JOIN showtimes s ON s.id = b.showtime_id
                WHERE b.user_id = $1 AND s.movie_id = $2 AND b.status = 'confirmed'
            )
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }
}
