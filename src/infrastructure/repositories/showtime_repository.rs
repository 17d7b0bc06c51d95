//! Showtime Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{
    BookingStatus, Money, SeatClaim, Showtime, ShowtimeFilter, ShowtimeRepository, ShowtimeStatus,
};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ShowtimeRow {
    id: i64,
    movie_id: i64,
    hall_id: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    base_price_amount: i64,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShowtimeRow {
    pub(crate) fn into_showtime(self) -> Result<Showtime, AppError> {
        let status: ShowtimeStatus = self.status.parse().map_err(AppError::Internal)?;
        Ok(Showtime {
            id: self.id,
            movie_id: self.movie_id,
            hall_id: self.hall_id,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            base_price: Money::new(self.base_price_amount, self.currency),
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) const SHOWTIME_COLUMNS: &str = "s.id, s.movie_id, s.hall_id, s.starts_at, s.ends_at, \
     s.base_price_amount, s.currency, s.status, s.created_at, s.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SeatClaimRow {
    seat_id: i64,
    status: String,
    expires_at: DateTime<Utc>,
}

pub(crate) async fn insert_showtime(
    conn: &mut PgConnection,
    showtime: &Showtime,
) -> Result<Showtime, AppError> {
    let row = sqlx::query_as::<_, ShowtimeRow>(
        r#"
        INSERT INTO showtimes AS s (id, movie_id, hall_id, starts_at, ends_at,
                                    base_price_amount, currency, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING s.id, s.movie_id, s.hall_id, s.starts_at, s.ends_at,
                  s.base_price_amount, s.currency, s.status, s.created_at, s.updated_at
        "#,
    )
    .bind(showtime.id)
    .bind(showtime.movie_id)
    .bind(showtime.hall_id)
    .bind(showtime.starts_at)
    .bind(showtime.ends_at)
    .bind(showtime.base_price.amount)
    .bind(&showtime.base_price.currency)
    .bind(showtime.status.as_str())
    .fetch_one(conn)
    .await?;

    row.into_showtime()
}

/// Non-cancelled showtimes of a hall running at any point in `[from, to)`.
pub(crate) async fn find_overlapping(
    conn: &mut PgConnection,
    hall_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Showtime>, AppError> {
    let rows = sqlx::query_as::<_, ShowtimeRow>(&format!(
        r#"
        SELECT {}
        FROM showtimes s
        WHERE s.hall_id = $1
          AND s.status <> 'cancelled'
          AND s.starts_at < $3
          AND s.ends_at > $2
        ORDER BY s.starts_at
        "#,
        SHOWTIME_COLUMNS
    ))
    .bind(hall_id)
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(ShowtimeRow::into_showtime).collect()
}

/// PostgreSQL showtime repository implementation.
#[derive(Clone)]
pub struct PgShowtimeRepository {
    pool: PgPool,
}

impl PgShowtimeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShowtimeRepository for PgShowtimeRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Showtime>, AppError> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {} FROM showtimes s WHERE s.id = $1",
            SHOWTIME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ShowtimeRow::into_showtime).transpose()
    }

    async fn list(&self, filter: &ShowtimeFilter) -> Result<Vec<Showtime>, AppError> {
        let rows = sqlx::query_as::<_, ShowtimeRow>(&format!(
            r#"
            SELECT {}
            FROM showtimes s
            JOIN halls h ON h.id = s.hall_id
            WHERE ($1::BIGINT IS NULL OR s.movie_id = $1)
              AND ($2::BIGINT IS NULL OR s.hall_id = $2)
              AND ($3::BIGINT IS NULL OR h.branch_id = $3)
              AND ($4::DATE IS NULL OR (s.starts_at AT TIME ZONE 'UTC')::DATE = $4)
              AND ($5::TIMESTAMPTZ IS NULL OR (s.starts_at > $5 AND s.status = 'scheduled'))
            ORDER BY s.starts_at, s.id
            "#,
            SHOWTIME_COLUMNS
        ))
        .bind(filter.movie_id)
        .bind(filter.hall_id)
        .bind(filter.branch_id)
        .bind(filter.date)
        .bind(filter.upcoming_after)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ShowtimeRow::into_showtime).collect()
    }

    async fn seat_claims(&self, showtime_id: i64) -> Result<Vec<SeatClaim>, AppError> {
        let rows = sqlx::query_as::<_, SeatClaimRow>(
            r#"
            SELECT bs.seat_id, b.status, b.expires_at
            FROM booking_seats bs
            JOIN bookings b ON b.id = bs.booking_id
            WHERE bs.showtime_id = $1
              AND bs.is_active
              AND b.status IN ('pending', 'confirmed')
            "#,
        )
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let status: BookingStatus = row.status.parse().map_err(AppError::Internal)?;
                Ok(SeatClaim {
                    seat_id: row.seat_id,
                    status,
                    expires_at: row.expires_at,
                })
            })
            .collect()
    }
}
