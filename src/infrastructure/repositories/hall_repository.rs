//! Hall Repository Implementation
//!
//! Halls and their seat grids. A hall and its seats are created in one
//! transaction so a hall never exists without its grid.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Hall, HallRepository, HallType, Seat, SeatType};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HallRow {
    id: i64,
    branch_id: i64,
    name: String,
    hall_type: String,
    rows: i32,
    seats_per_row: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl HallRow {
    pub(crate) fn into_hall(self) -> Result<Hall, AppError> {
        let hall_type: HallType = self.hall_type.parse().map_err(AppError::Internal)?;
        Ok(Hall {
            id: self.id,
            branch_id: self.branch_id,
            name: self.name,
            hall_type,
            rows: self.rows,
            seats_per_row: self.seats_per_row,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SeatRow {
    id: i64,
    hall_id: i64,
    row_label: String,
    number: i32,
    seat_type: String,
    is_active: bool,
}

impl SeatRow {
    pub(crate) fn into_seat(self) -> Result<Seat, AppError> {
        let seat_type: SeatType = self.seat_type.parse().map_err(AppError::Internal)?;
        Ok(Seat {
            id: self.id,
            hall_id: self.hall_id,
            row_label: self.row_label,
            number: self.number,
            seat_type,
            is_active: self.is_active,
        })
    }
}

pub(crate) const HALL_COLUMNS: &str =
    "id, branch_id, name, hall_type, rows, seats_per_row, is_active, created_at, updated_at";

/// PostgreSQL hall repository implementation.
#[derive(Clone)]
pub struct PgHallRepository {
    pool: PgPool,
}

impl PgHallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HallRepository for PgHallRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Hall>, AppError> {
        let row = sqlx::query_as::<_, HallRow>(&format!(
            "SELECT {} FROM halls WHERE id = $1",
            HALL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HallRow::into_hall).transpose()
    }

    async fn list_by_branch(
        &self,
        branch_id: i64,
        active_only: bool,
    ) -> Result<Vec<Hall>, AppError> {
        let rows = sqlx::query_as::<_, HallRow>(&format!(
            r#"
            SELECT {}
            FROM halls
            WHERE branch_id = $1 AND ($2 = FALSE OR is_active)
            ORDER BY name
            "#,
            HALL_COLUMNS
        ))
        .bind(branch_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HallRow::into_hall).collect()
    }

    async fn create_with_seats(&self, hall: &Hall, seats: &[Seat]) -> Result<Hall, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, HallRow>(&format!(
            r#"
            INSERT INTO halls (id, branch_id, name, hall_type, rows, seats_per_row, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            HALL_COLUMNS
        ))
        .bind(hall.id)
        .bind(hall.branch_id)
        .bind(&hall.name)
        .bind(hall.hall_type.as_str())
        .bind(hall.rows)
        .bind(hall.seats_per_row)
        .bind(hall.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "A hall with this name already exists in the branch")
        })?;

        let ids: Vec<i64> = seats.iter().map(|s| s.id).collect();
        let labels: Vec<String> = seats.iter().map(|s| s.row_label.clone()).collect();
        let numbers: Vec<i32> = seats.iter().map(|s| s.number).collect();
        let types: Vec<String> = seats.iter().map(|s| s.seat_type.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO seats (id, hall_id, row_label, number, seat_type)
            SELECT id, $2, row_label, number, seat_type
            FROM UNNEST($1::BIGINT[], $3::VARCHAR[], $4::INT[], $5::VARCHAR[])
                 AS s(id, row_label, number, seat_type)
            "#,
        )
        .bind(&ids)
        .bind(hall.id)
        .bind(&labels)
        .bind(&numbers)
        .bind(&types)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row.into_hall()
    }

    async fn update(&self, hall: &Hall) -> Result<Hall, AppError> {
        let row = sqlx::query_as::<_, HallRow>(&format!(
            r#"
            UPDATE halls
            SET name = $2, hall_type = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            HALL_COLUMNS
        ))
        .bind(hall.id)
        .bind(&hall.name)
        .bind(hall.hall_type.as_str())
        .bind(hall.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "A hall with this name already exists in the branch")
        })?
        .ok_or_else(|| AppError::NotFound(format!("Hall with id {} not found", hall.id)))?;

        row.into_hall()
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM halls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Hall with id {} not found", id)));
        }

        Ok(())
    }

    async fn has_showtimes(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM showtimes WHERE hall_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn seats(&self, hall_id: i64) -> Result<Vec<Seat>, AppError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, hall_id, row_label, number, seat_type, is_active
            FROM seats
            WHERE hall_id = $1
            ORDER BY row_label, number
            "#,
        )
        .bind(hall_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    async fn find_seat(&self, seat_id: i64) -> Result<Option<Seat>, AppError> {
        let row = sqlx::query_as::<_, SeatRow>(
            "SELECT id, hall_id, row_label, number, seat_type, is_active FROM seats WHERE id = $1",
        )
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SeatRow::into_seat).transpose()
    }

    async fn find_seats(&self, hall_id: i64, seat_ids: &[i64]) -> Result<Vec<Seat>, AppError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, hall_id, row_label, number, seat_type, is_active
            FROM seats
            WHERE hall_id = $1 AND id = ANY($2)
            ORDER BY row_label, number
            "#,
        )
        .bind(hall_id)
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    async fn update_seat(&self, seat: &Seat) -> Result<Seat, AppError> {
        let row = sqlx::query_as::<_, SeatRow>(
            r#"
            UPDATE seats
            SET seat_type = $2, is_active = $3
            WHERE id = $1
            RETURNING id, hall_id, row_label, number, seat_type, is_active
            "#,
        )
        .bind(seat.id)
        .bind(seat.seat_type.as_str())
        .bind(seat.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Seat with id {} not found", seat.id)))?;

        row.into_seat()
    }
}
