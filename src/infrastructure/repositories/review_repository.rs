//! Review Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Review, ReviewRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    user_id: i64,
    movie_id: i64,
    rating: i16,
    comment: Option<String>,
    author_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            user_id: row.user_id,
            movie_id: row.movie_id,
            rating: row.rating,
            comment: row.comment,
            author_name: row.author_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.movie_id, r.rating, r.comment, u.full_name AS author_name,
           r.created_at, r.updated_at
    FROM reviews r
    LEFT JOIN users u ON u.id = r.user_id
"#;

/// PostgreSQL review repository implementation.
#[derive(Clone)]
pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn reload(&self, id: i64) -> Result<Review, AppError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review with id {} not found", id)))
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Review>, AppError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Review::from))
    }

    async fn list_by_movie(
        &self,
        movie_id: i64,
        page: PageParams,
    ) -> Result<(Vec<Review>, i64), AppError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{} WHERE r.movie_id = $1 ORDER BY r.created_at DESC, r.id DESC LIMIT $2 OFFSET $3",
            REVIEW_SELECT
        ))
        .bind(movie_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE movie_id = $1")
            .bind(movie_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Review::from).collect(), total))
    }

    async fn create(&self, review: &Review) -> Result<Review, AppError> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, user_id, movie_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.movie_id)
        .bind(review.rating)
        .bind(&review.comment)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "You have already reviewed this movie"))?;

        self.reload(review.id).await
    }

    async fn update(&self, review: &Review) -> Result<Review, AppError> {
        let result = sqlx::query(
            "UPDATE reviews SET rating = $2, comment = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(review.id)
        .bind(review.rating)
        .bind(&review.comment)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review with id {} not found", review.id)));
        }

        self.reload(review.id).await
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review with id {} not found", id)));
        }

        Ok(())
    }
}
