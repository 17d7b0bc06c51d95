//! Ticket Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Ticket, TicketRepository, TicketStatus, TicketView};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: i64,
    ticket_code: String,
    booking_id: i64,
    showtime_id: i64,
    seat_id: i64,
    user_id: i64,
    status: String,
    issued_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket, AppError> {
        let status: TicketStatus = self.status.parse().map_err(AppError::Internal)?;
        Ok(Ticket {
            id: self.id,
            ticket_code: self.ticket_code,
            booking_id: self.booking_id,
            showtime_id: self.showtime_id,
            seat_id: self.seat_id,
            user_id: self.user_id,
            status,
            issued_at: self.issued_at,
            used_at: self.used_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketViewRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    movie_title: String,
    branch_name: String,
    hall_name: String,
    row_label: String,
    seat_number: i32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl TicketViewRow {
    fn into_view(self) -> Result<TicketView, AppError> {
        Ok(TicketView {
            ticket: self.ticket.into_ticket()?,
            movie_title: self.movie_title,
            branch_name: self.branch_name,
            hall_name: self.hall_name,
            row_label: self.row_label,
            seat_number: self.seat_number,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        })
    }
}

const TICKET_VIEW_SELECT: &str = r#"
    SELECT t.id, t.ticket_code, t.booking_id, t.showtime_id, t.seat_id, t.user_id,
           t.status, t.issued_at, t.used_at,
           m.title AS movie_title, br.name AS branch_name, h.name AS hall_name,
           se.row_label, se.number AS seat_number, s.starts_at, s.ends_at
    FROM tickets t
    JOIN showtimes s ON s.id = t.showtime_id
    JOIN movies m ON m.id = s.movie_id
    JOIN halls h ON h.id = s.hall_id
    JOIN branches br ON br.id = h.branch_id
    JOIN seats se ON se.id = t.seat_id
"#;

/// PostgreSQL ticket repository implementation.
#[derive(Clone)]
pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<TicketView>, AppError> {
        let rows = sqlx::query_as::<_, TicketViewRow>(&format!(
            "{} WHERE t.user_id = $1 ORDER BY s.starts_at, se.row_label, se.number",
            TICKET_VIEW_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TicketViewRow::into_view).collect()
    }

    async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Ticket>, AppError> {
        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, ticket_code, booking_id, showtime_id, seat_id, user_id,
                   status, issued_at, used_at
            FROM tickets
            WHERE booking_id = $1
            ORDER BY issued_at, id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<TicketView>, AppError> {
        let row = sqlx::query_as::<_, TicketViewRow>(&format!(
            "{} WHERE t.ticket_code = $1",
            TICKET_VIEW_SELECT
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TicketViewRow::into_view).transpose()
    }

    async fn mark_used(&self, id: i64, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'used', used_at = $2 WHERE id = $1 AND status = 'valid'",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
