//! Reporting queries behind the admin dashboard.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::domain::{DailyRevenue, MovieSales, ReportRepository, SalesReport};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct MovieSalesRow {
    movie_id: i64,
    title: String,
    tickets_sold: i64,
    revenue: i64,
}

/// PostgreSQL reporting implementation.
#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn sales_report(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        top: i64,
    ) -> Result<SalesReport, AppError> {
        // Refunded payments were collected first, so they count towards gross.
        let (gross_revenue, refunded) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE paid_at >= $1 AND paid_at <= $2), 0)::BIGINT,
                COALESCE(SUM(amount) FILTER (
                    WHERE status = 'refunded' AND refunded_at >= $1 AND refunded_at <= $2), 0)::BIGINT
            FROM payments
            WHERE paid_at IS NOT NULL
            "#,
        )
        .bind(since)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let bookings_by_status = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM bookings
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(since)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let tickets_sold = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tickets
            WHERE status <> 'cancelled' AND issued_at >= $1 AND issued_at <= $2
            "#,
        )
        .bind(since)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let active_movies =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM movies WHERE status = 'now_showing'")
                .fetch_one(&self.pool)
                .await?;

        let upcoming_showtimes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM showtimes WHERE status = 'scheduled' AND starts_at > $1",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let revenue_by_day = sqlx::query_as::<_, (NaiveDate, i64)>(
            r#"
            SELECT (paid_at AT TIME ZONE 'UTC')::DATE AS day, SUM(amount)::BIGINT
            FROM payments
            WHERE paid_at >= $1 AND paid_at <= $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(since)
        .bind(now)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(day, amount)| DailyRevenue { day, amount })
        .collect();

        let top_movies = sqlx::query_as::<_, MovieSalesRow>(
            r#"
            SELECT m.id AS movie_id, m.title, COUNT(t.id) AS tickets_sold,
                   COALESCE(SUM(bs.price), 0)::BIGINT AS revenue
            FROM tickets t
            JOIN booking_seats bs ON bs.booking_id = t.booking_id AND bs.seat_id = t.seat_id
            JOIN showtimes s ON s.id = t.showtime_id
            JOIN movies m ON m.id = s.movie_id
            WHERE t.status <> 'cancelled' AND t.issued_at >= $1 AND t.issued_at <= $2
            GROUP BY m.id, m.title
            ORDER BY tickets_sold DESC, revenue DESC, m.id
            LIMIT $3
            "#,
        )
        .bind(since)
        .bind(now)
        .bind(top)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| MovieSales {
            movie_id: r.movie_id,
            title: r.title,
            tickets_sold: r.tickets_sold,
            revenue: r.revenue,
        })
        .collect();

        Ok(SalesReport {
            gross_revenue,
            refunded,
            bookings_by_status,
            tickets_sold,
            active_movies,
            upcoming_showtimes,
            revenue_by_day,
            top_movies,
        })
    }
}
