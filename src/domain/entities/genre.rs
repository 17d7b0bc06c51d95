//! Genre entity and repository trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maps to the `genres` table. Names are unique ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[async_trait]
pub trait GenreRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Genre>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Genre>, AppError>;

    /// Genres among `ids` that exist.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Genre>, AppError>;

    /// Insert a genre. A case-insensitive duplicate yields `AppError::Conflict`.
    async fn create(&self, genre: &Genre) -> Result<Genre, AppError>;

    async fn update(&self, genre: &Genre) -> Result<Genre, AppError>;

    /// Delete the genre, detaching it from every movie.
    async fn delete(&self, id: i64) -> Result<(), AppError>;
}
