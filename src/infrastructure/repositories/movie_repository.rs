//! Movie Repository Implementation
//!
//! Movies with their genre links from `movie_genres`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{
    AgeRating, Movie, MovieFilter, MovieRepository, MovieSort, MovieStatus, RatingSummary,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    description: String,
    duration_minutes: i32,
    release_date: NaiveDate,
    age_rating: String,
    language: String,
    poster_url: Option<String>,
    trailer_url: Option<String>,
    status: String,
    genre_ids: Vec<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MovieRow {
    fn into_movie(self) -> Result<Movie, AppError> {
        let age_rating: AgeRating = self.age_rating.parse().map_err(AppError::Internal)?;
        let status: MovieStatus = self.status.parse().map_err(AppError::Internal)?;
        Ok(Movie {
            id: self.id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes,
            release_date: self.release_date,
            age_rating,
            language: self.language,
            poster_url: self.poster_url,
            trailer_url: self.trailer_url,
            status,
            genre_ids: self.genre_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const MOVIE_SELECT: &str = r#"
    SELECT m.id, m.title, m.description, m.duration_minutes, m.release_date, m.age_rating,
           m.language, m.poster_url, m.trailer_url, m.status,
           ARRAY(SELECT mg.genre_id FROM movie_genres mg WHERE mg.movie_id = m.id ORDER BY mg.genre_id)
               AS genre_ids,
           m.created_at, m.updated_at
    FROM movies m
"#;

const MOVIE_FILTER: &str = r#"
    WHERE ($1::TEXT IS NULL OR LOWER(m.title) LIKE $1)
      AND ($2::BIGINT IS NULL OR EXISTS (
            SELECT 1 FROM movie_genres mg WHERE mg.movie_id = m.id AND mg.genre_id = $2))
      AND ($3::TEXT IS NULL OR m.status = $3)
"#;

fn order_clause(sort: MovieSort) -> &'static str {
    match sort {
        MovieSort::ReleaseDateDesc => "ORDER BY m.release_date DESC, m.id DESC",
        MovieSort::ReleaseDateAsc => "ORDER BY m.release_date ASC, m.id ASC",
        MovieSort::Title => "ORDER BY LOWER(m.title) ASC, m.id ASC",
    }
}

async fn replace_genres(
    conn: &mut PgConnection,
    movie_id: i64,
    genre_ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
        .bind(movie_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO movie_genres (movie_id, genre_id)
        SELECT $1, g FROM UNNEST($2::BIGINT[]) AS g
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(movie_id)
    .bind(genre_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// PostgreSQL movie repository implementation.
#[derive(Clone)]
pub struct PgMovieRepository {
    pool: PgPool,
}

impl PgMovieRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Movie>, AppError> {
        let row = sqlx::query_as::<_, MovieRow>(&format!("{} WHERE m.id = $1", MOVIE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MovieRow::into_movie).transpose()
    }

    async fn list(
        &self,
        filter: &MovieFilter,
        page: PageParams,
    ) -> Result<(Vec<Movie>, i64), AppError> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.to_lowercase()));
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "{} {} {} LIMIT $4 OFFSET $5",
            MOVIE_SELECT,
            MOVIE_FILTER,
            order_clause(filter.sort)
        ))
        .bind(&pattern)
        .bind(filter.genre_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM movies m {}",
            MOVIE_FILTER
        ))
        .bind(&pattern)
        .bind(filter.genre_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let movies = rows
            .into_iter()
            .map(MovieRow::into_movie)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((movies, total))
    }

    async fn list_by_status(&self, status: MovieStatus) -> Result<Vec<Movie>, AppError> {
        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "{} WHERE m.status = $1 ORDER BY m.release_date DESC, m.id DESC",
            MOVIE_SELECT
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MovieRow::into_movie).collect()
    }

    async fn create(&self, movie: &Movie) -> Result<Movie, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO movies (id, title, description, duration_minutes, release_date,
                                age_rating, language, poster_url, trailer_url, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(movie.duration_minutes)
        .bind(movie.release_date)
        .bind(movie.age_rating.as_str())
        .bind(&movie.language)
        .bind(&movie.poster_url)
        .bind(&movie.trailer_url)
        .bind(movie.status.as_str())
        .execute(&mut *tx)
        .await?;

        replace_genres(&mut tx, movie.id, &movie.genre_ids).await?;

        let row = sqlx::query_as::<_, MovieRow>(&format!("{} WHERE m.id = $1", MOVIE_SELECT))
            .bind(movie.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        row.into_movie()
    }

    async fn update(&self, movie: &Movie) -> Result<Movie, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE movies
            SET title = $2, description = $3, duration_minutes = $4, release_date = $5,
                age_rating = $6, language = $7, poster_url = $8, trailer_url = $9,
                status = $10, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(movie.duration_minutes)
        .bind(movie.release_date)
        .bind(movie.age_rating.as_str())
        .bind(&movie.language)
        .bind(&movie.poster_url)
        .bind(&movie.trailer_url)
        .bind(movie.status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Movie with id {} not found", movie.id)));
        }

        replace_genres(&mut tx, movie.id, &movie.genre_ids).await?;

        let row = sqlx::query_as::<_, MovieRow>(&format!("{} WHERE m.id = $1", MOVIE_SELECT))
            .bind(movie.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        row.into_movie()
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Movie with id {} not found", id)));
        }

        Ok(())
    }

    async fn has_showtimes(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM showtimes WHERE movie_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn rating_summary(&self, id: i64) -> Result<RatingSummary, AppError> {
        let (average, count) = sqlx::query_as::<_, (Option<f64>, i64)>(
            "SELECT AVG(rating)::FLOAT8, COUNT(*) FROM reviews WHERE movie_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingSummary {
            average: average.map(|avg| (avg * 10.0).round() / 10.0),
            count,
        })
    }
}
