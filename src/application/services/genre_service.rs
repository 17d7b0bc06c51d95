//! Genre Service

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::request::GenreRequest;
use crate::application::dto::response::GenreResponse;
use crate::domain::{Genre, GenreRepository};
use crate::infrastructure::cache::{keys, Cache};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::validate;

#[async_trait]
pub trait GenreService: Send + Sync {
    async fn list(&self) -> Result<Vec<GenreResponse>, GenreError>;

    async fn create(&self, request: GenreRequest) -> Result<GenreResponse, GenreError>;

    async fn update(&self, id: i64, request: GenreRequest) -> Result<GenreResponse, GenreError>;

    /// Delete a genre and detach it from every movie
    async fn delete(&self, id: i64) -> Result<(), GenreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenreError {
    #[error("Genre not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<GenreError> for AppError {
    fn from(err: GenreError) -> Self {
        match err {
            GenreError::NotFound => AppError::NotFound(err.to_string()),
            GenreError::Repository(e) => e,
        }
    }
}

pub struct GenreServiceImpl<G: GenreRepository> {
    genre_repo: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
    cache: Arc<dyn Cache>,
}

impl<G: GenreRepository> GenreServiceImpl<G> {
    pub fn new(genre_repo: Arc<G>, id_generator: Arc<SnowflakeGenerator>, cache: Arc<dyn Cache>) -> Self {
        Self {
            genre_repo,
            id_generator,
            cache,
        }
    }
}

#[async_trait]
impl<G: GenreRepository + 'static> GenreService for GenreServiceImpl<G> {
    async fn list(&self) -> Result<Vec<GenreResponse>, GenreError> {
        let genres = self.genre_repo.list().await?;
        Ok(genres.into_iter().map(GenreResponse::from).collect())
    }

    async fn create(&self, request: GenreRequest) -> Result<GenreResponse, GenreError> {
        validate(&request)?;
        let genre = Genre {
            id: self.id_generator.generate(),
            name: request.name.trim().to_string(),
        };
        Ok(self.genre_repo.create(&genre).await?.into())
    }

    async fn update(&self, id: i64, request: GenreRequest) -> Result<GenreResponse, GenreError> {
        validate(&request)?;
        let mut genre = self.genre_repo.find_by_id(id).await?.ok_or(GenreError::NotFound)?;
        genre.name = request.name.trim().to_string();

        let updated = self.genre_repo.update(&genre).await?;
        // Cached movie lists embed genre names
        self.cache.invalidate(&keys::MOVIE_LISTS).await;
        Ok(updated.into())
    }

    async fn delete(&self, id: i64) -> Result<(), GenreError> {
        self.genre_repo.find_by_id(id).await?.ok_or(GenreError::NotFound)?;
        self.genre_repo.delete(id).await?;
        self.cache.invalidate(&keys::MOVIE_LISTS).await;
        Ok(())
    }
}
