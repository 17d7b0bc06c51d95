//! Genre Repository Implementation

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{Genre, GenreRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct GenreRow {
    id: i64,
    name: String,
}

impl From<GenreRow> for Genre {
    fn from(row: GenreRow) -> Self {
        Genre {
            id: row.id,
            name: row.name,
        }
    }
}

const DUPLICATE_GENRE: &str = "A genre with this name already exists";

/// PostgreSQL genre repository implementation.
#[derive(Clone)]
pub struct PgGenreRepository {
    pool: PgPool,
}

impl PgGenreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenreRepository for PgGenreRepository {
    async fn list(&self) -> Result<Vec<Genre>, AppError> {
        let rows = sqlx::query_as::<_, GenreRow>("SELECT id, name FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Genre::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Genre>, AppError> {
        let row = sqlx::query_as::<_, GenreRow>("SELECT id, name FROM genres WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Genre::from))
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Genre>, AppError> {
        let rows = sqlx::query_as::<_, GenreRow>(
            "SELECT id, name FROM genres WHERE id = ANY($1) ORDER BY name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Genre::from).collect())
    }

    async fn create(&self, genre: &Genre) -> Result<Genre, AppError> {
        let row = sqlx::query_as::<_, GenreRow>(
            "INSERT INTO genres (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(genre.id)
        .bind(&genre.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, DUPLICATE_GENRE))?;

        Ok(row.into())
    }

    async fn update(&self, genre: &Genre) -> Result<Genre, AppError> {
        let row = sqlx::query_as::<_, GenreRow>(
            "UPDATE genres SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(genre.id)
        .bind(&genre.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, DUPLICATE_GENRE))?
        .ok_or_else(|| AppError::NotFound(format!("Genre with id {} not found", genre.id)))?;

        Ok(row.into())
    }

    /// `movie_genres` rows cascade.
    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Genre with id {} not found", id)));
        }

        Ok(())
    }
}
