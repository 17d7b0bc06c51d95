//! Movie Service
//!
//! Catalog reads and admin writes. The now-showing and coming-soon lists
//! are served from the cache when possible; every movie write invalidates
//! both lists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::application::dto::request::{CreateMovieRequest, MovieListQuery, Paged, UpdateMovieRequest};
use crate::application::dto::response::{MovieDetailResponse, MovieResponse, ShowtimeResponse};
use crate::domain::{
    GenreRepository, Movie, MovieFilter, MovieRepository, MovieStatus, ShowtimeFilter,
    ShowtimeRepository,
};
use crate::infrastructure::cache::{keys, Cache};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_id, parse_optional_id, validate};

#[async_trait]
pub trait MovieService: Send + Sync {
    async fn list(&self, query: MovieListQuery) -> Result<Page<MovieResponse>, MovieError>;

    async fn now_showing(&self) -> Result<Vec<MovieResponse>, MovieError>;

    async fn coming_soon(&self) -> Result<Vec<MovieResponse>, MovieError>;

    async fn get(&self, id: i64) -> Result<MovieDetailResponse, MovieError>;

    /// Scheduled showtimes of the movie that have not started yet
    async fn upcoming_showtimes(&self, id: i64) -> Result<Vec<ShowtimeResponse>, MovieError>;

    async fn create(&self, request: CreateMovieRequest) -> Result<MovieResponse, MovieError>;

    async fn update(&self, id: i64, request: UpdateMovieRequest) -> Result<MovieResponse, MovieError>;

    async fn delete(&self, id: i64) -> Result<(), MovieError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MovieError {
    #[error("Movie not found")]
    NotFound,

    #[error("Unknown genre: {0}")]
    UnknownGenre(i64),

    #[error("Movie still has showtimes")]
    HasShowtimes,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<MovieError> for AppError {
    fn from(err: MovieError) -> Self {
        match err {
            MovieError::NotFound => AppError::NotFound(err.to_string()),
            MovieError::UnknownGenre(_) => AppError::BadRequest(err.to_string()),
            MovieError::HasShowtimes => AppError::Conflict(err.to_string()),
            MovieError::Repository(e) => e,
        }
    }
}

pub struct MovieServiceImpl<M, G, S>
where
    M: MovieRepository,
    G: GenreRepository,
    S: ShowtimeRepository,
{
    movie_repo: Arc<M>,
    genre_repo: Arc<G>,
    showtime_repo: Arc<S>,
    id_generator: Arc<SnowflakeGenerator>,
    cache: Arc<dyn Cache>,
    cache_ttl_seconds: u64,
}

impl<M, G, S> MovieServiceImpl<M, G, S>
where
    M: MovieRepository,
    G: GenreRepository,
    S: ShowtimeRepository,
{
    pub fn new(
        movie_repo: Arc<M>,
        genre_repo: Arc<G>,
        showtime_repo: Arc<S>,
        id_generator: Arc<SnowflakeGenerator>,
        cache: Arc<dyn Cache>,
        cache_ttl_seconds: u64,
    ) -> Self {
        Self {
            movie_repo,
            genre_repo,
            showtime_repo,
            id_generator,
            cache,
            cache_ttl_seconds,
        }
    }

    async fn load(&self, id: i64) -> Result<Movie, MovieError> {
        self.movie_repo.find_by_id(id).await?.ok_or(MovieError::NotFound)
    }

    /// Parse genre ids and make sure every one exists.
    async fn resolve_genres(&self, raw: &[String]) -> Result<Vec<i64>, MovieError> {
        let mut ids = raw
            .iter()
            .map(|id| parse_id(id, "genre"))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        ids.dedup();

        let found = self.genre_repo.find_by_ids(&ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|g| g.id == **id)) {
            return Err(MovieError::UnknownGenre(*missing));
        }
        Ok(ids)
    }

    async fn to_responses(&self, movies: Vec<Movie>) -> Result<Vec<MovieResponse>, MovieError> {
        let genres = self.genre_repo.list().await?;
        Ok(movies
            .into_iter()
            .map(|m| MovieResponse::from_movie(m, &genres))
            .collect())
    }

    async fn cached_list(&self, key: &str, status: MovieStatus) -> Result<Vec<MovieResponse>, MovieError> {
        if let Some(cached) = self.cache.get_json::<Vec<MovieResponse>>(key).await {
            return Ok(cached);
        }
        let movies = self.movie_repo.list_by_status(status).await?;
        let responses = self.to_responses(movies).await?;
        self.cache.set_json(key, &responses, self.cache_ttl_seconds).await;
        Ok(responses)
    }

    async fn invalidate_lists(&self) {
        self.cache.invalidate(&keys::MOVIE_LISTS).await;
    }
}

#[async_trait]
impl<M, G, S> MovieService for MovieServiceImpl<M, G, S>
where
    M: MovieRepository + 'static,
    G: GenreRepository + 'static,
    S: ShowtimeRepository + 'static,
{
    async fn list(&self, query: MovieListQuery) -> Result<Page<MovieResponse>, MovieError> {
        let page = query.page_params();
        let filter = MovieFilter {
            search: query.search.filter(|s| !s.trim().is_empty()),
            genre_id: parse_optional_id(query.genre_id.as_deref(), "genre")?,
            status: query.status,
            sort: query.sort.unwrap_or_default(),
        };
        let (movies, total) = self.movie_repo.list(&filter, page).await?;
        let items = self.to_responses(movies).await?;
        Ok(Page::new(items, page, total))
    }

    async fn now_showing(&self) -> Result<Vec<MovieResponse>, MovieError> {
        self.cached_list(keys::MOVIES_NOW_SHOWING, MovieStatus::NowShowing)
            .await
    }

    async fn coming_soon(&self) -> Result<Vec<MovieResponse>, MovieError> {
        self.cached_list(keys::MOVIES_COMING_SOON, MovieStatus::ComingSoon)
            .await
    }

    async fn get(&self, id: i64) -> Result<MovieDetailResponse, MovieError> {
        let movie = self.load(id).await?;
        let genres = self.genre_repo.find_by_ids(&movie.genre_ids).await?;
        let rating = self.movie_repo.rating_summary(id).await?;
        Ok(MovieDetailResponse::new(
            MovieResponse::from_movie(movie, &genres),
            rating,
        ))
    }

    async fn upcoming_showtimes(&self, id: i64) -> Result<Vec<ShowtimeResponse>, MovieError> {
        self.load(id).await?;
        let filter = ShowtimeFilter {
            movie_id: Some(id),
            upcoming_after: Some(Utc::now()),
            ..Default::default()
        };
        let showtimes = self.showtime_repo.list(&filter).await?;
        Ok(showtimes.into_iter().map(ShowtimeResponse::from).collect())
    }

    async fn create(&self, request: CreateMovieRequest) -> Result<MovieResponse, MovieError> {
        validate(&request)?;
        let genre_ids = self.resolve_genres(&request.genre_ids).await?;

        let now = Utc::now();
        let movie = Movie {
            id: self.id_generator.generate(),
            title: request.title.trim().to_string(),
            description: request.description,
            duration_minutes: request.duration_minutes,
            release_date: request.release_date,
            age_rating: request.age_rating,
            language: request.language.trim().to_string(),
            poster_url: request.poster_url,
            trailer_url: request.trailer_url,
            status: request.status,
            genre_ids,
            created_at: now,
            updated_at: now,
        };

        let created = self.movie_repo.create(&movie).await?;
        self.invalidate_lists().await;
        info!(movie_id = created.id, title = %created.title, "Movie created");

        let genres = self.genre_repo.find_by_ids(&created.genre_ids).await?;
        Ok(MovieResponse::from_movie(created, &genres))
    }

    async fn update(&self, id: i64, request: UpdateMovieRequest) -> Result<MovieResponse, MovieError> {
        validate(&request)?;
        let mut movie = self.load(id).await?;

        if let Some(title) = request.title {
            movie.title = title.trim().to_string();
        }
        if let Some(description) = request.description {
            movie.description = description;
        }
        if let Some(duration) = request.duration_minutes {
            movie.duration_minutes = duration;
        }
        if let Some(release_date) = request.release_date {
            movie.release_date = release_date;
        }
        if let Some(age_rating) = request.age_rating {
            movie.age_rating = age_rating;
        }
        if let Some(language) = request.language {
            movie.language = language.trim().to_string();
        }
        if let Some(poster_url) = request.poster_url {
            movie.poster_url = Some(poster_url).filter(|u| !u.is_empty());
        }
        if let Some(trailer_url) = request.trailer_url {
            movie.trailer_url = Some(trailer_url).filter(|u| !u.is_empty());
        }
        if let Some(status) = request.status {
            movie.status = status;
        }
        if let Some(genre_ids) = request.genre_ids {
            movie.genre_ids = self.resolve_genres(&genre_ids).await?;
        }
        movie.updated_at = Utc::now();

        let updated = self.movie_repo.update(&movie).await?;
        self.invalidate_lists().await;

        let genres = self.genre_repo.find_by_ids(&updated.genre_ids).await?;
        Ok(MovieResponse::from_movie(updated, &genres))
    }

    async fn delete(&self, id: i64) -> Result<(), MovieError> {
        self.load(id).await?;
        if self.movie_repo.has_showtimes(id).await? {
            return Err(MovieError::HasShowtimes);
        }
        self.movie_repo.delete(id).await?;
        self.invalidate_lists().await;
        info!(movie_id = id, "Movie deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{Fixture, InMemoryDb, MemoryCache};
    use chrono::NaiveDate;

    fn service(db: &InMemoryDb, cache: Arc<MemoryCache>) -> MovieServiceImpl<InMemoryDb, InMemoryDb, InMemoryDb> {
        MovieServiceImpl::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(SnowflakeGenerator::new(1, 5)),
            cache,
            60,
        )
    }

    fn create_request(genre_ids: Vec<String>) -> CreateMovieRequest {
        CreateMovieRequest {
            title: "Night Train".into(),
            description: String::new(),
            duration_minutes: 95,
            release_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            age_rating: Default::default(),
            language: "English".into(),
            poster_url: None,
            trailer_url: None,
            status: MovieStatus::ComingSoon,
            genre_ids,
        }
    }

    #[tokio::test]
    async fn test_now_showing_is_cached_until_write() {
        let fx = Fixture::new();
        let cache = Arc::new(MemoryCache::default());
        let movies = service(&fx.db, cache.clone());

        let first = movies.now_showing().await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(cache.contains(keys::MOVIES_NOW_SHOWING));

        movies
            .update(
                fx.movie.id,
                UpdateMovieRequest {
                    status: Some(MovieStatus::Ended),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!cache.contains(keys::MOVIES_NOW_SHOWING));
        assert!(movies.now_showing().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_genre() {
        let fx = Fixture::new();
        let movies = service(&fx.db, Arc::new(MemoryCache::default()));

        let result = movies.create(create_request(vec!["424242".into()])).await;
        assert!(matches!(result, Err(MovieError::UnknownGenre(424242))));

        let created = movies
            .create(create_request(vec![fx.genre.id.to_string()]))
            .await
            .unwrap();
        assert_eq!(created.genres.len(), 1);
        assert_eq!(created.genres[0].name, fx.genre.name);
    }

    #[tokio::test]
    async fn test_delete_refused_while_showtimes_exist() {
        let fx = Fixture::new();
        let movies = service(&fx.db, Arc::new(MemoryCache::default()));
        assert!(matches!(
            movies.delete(fx.movie.id).await,
            Err(MovieError::HasShowtimes)
        ));
    }

    #[tokio::test]
    async fn test_detail_includes_rating_and_upcoming_showtimes() {
        let fx = Fixture::new();
        let movies = service(&fx.db, Arc::new(MemoryCache::default()));

        let detail = movies.get(fx.movie.id).await.unwrap();
        assert_eq!(detail.review_count, 0);
        assert_eq!(detail.average_rating, None);

        let showtimes = movies.upcoming_showtimes(fx.movie.id).await.unwrap();
        assert_eq!(showtimes.len(), 1);
        assert_eq!(showtimes[0].id, fx.showtime.id.to_string());
    }
}
