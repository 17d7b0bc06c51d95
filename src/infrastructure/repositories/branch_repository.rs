//! Branch Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Branch, BranchRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: i64,
    name: String,
    address: String,
    city: String,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BranchRow {
    fn into_branch(self) -> Branch {
        Branch {
            id: self.id,
            name: self.name,
            address: self.address,
            city: self.city,
            phone: self.phone,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL branch repository implementation.
#[derive(Clone)]
pub struct PgBranchRepository {
    pool: PgPool,
}

impl PgBranchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BranchRepository for PgBranchRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Branch>, AppError> {
        let row = sqlx::query_as::<_, BranchRow>(
            r#"
            SELECT id, name, address, city, phone, is_active, created_at, updated_at
            FROM branches
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_branch()))
    }

    async fn list(&self, active_only: bool, city: Option<&str>) -> Result<Vec<Branch>, AppError> {
        let rows = sqlx::query_as::<_, BranchRow>(
            r#"
            SELECT id, name, address, city, phone, is_active, created_at, updated_at
            FROM branches
            WHERE ($1 = FALSE OR is_active)
              AND ($2::TEXT IS NULL OR LOWER(city) = LOWER($2))
            ORDER BY name
            "#,
        )
        .bind(active_only)
        .bind(city)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_branch()).collect())
    }

    async fn create(&self, branch: &Branch) -> Result<Branch, AppError> {
        let row = sqlx::query_as::<_, BranchRow>(
            r#"
            INSERT INTO branches (id, name, address, city, phone, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, address, city, phone, is_active, created_at, updated_at
            "#,
        )
        .bind(branch.id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.city)
        .bind(&branch.phone)
        .bind(branch.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A branch with this name already exists"))?;

        Ok(row.into_branch())
    }

    async fn update(&self, branch: &Branch) -> Result<Branch, AppError> {
        let row = sqlx::query_as::<_, BranchRow>(
            r#"
            UPDATE branches
            SET name = $2, address = $3, city = $4, phone = $5, is_active = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, address, city, phone, is_active, created_at, updated_at
            "#,
        )
        .bind(branch.id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.city)
        .bind(&branch.phone)
        .bind(branch.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A branch with this name already exists"))?
        .ok_or_else(|| AppError::NotFound(format!("Branch with id {} not found", branch.id)))?;

        Ok(row.into_branch())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Branch with id {} not found", id)));
        }

        Ok(())
    }

    async fn has_halls(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM halls WHERE branch_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }
}
