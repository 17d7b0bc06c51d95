//! Review entity and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

pub const MAX_COMMENT_CHARS: usize = 2000;

/// Maps to `reviews`. One review per `(user_id, movie_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub movie_id: i64,
    /// 1..=5
    pub rating: i16,
    pub comment: Option<String>,
    /// Display name of the author, filled on reads
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Review>, AppError>;

    /// Newest first.
    async fn list_by_movie(&self, movie_id: i64, page: PageParams)
        -> Result<(Vec<Review>, i64), AppError>;

    /// Insert a review. A second review of the same movie yields `AppError::Conflict`.
    async fn create(&self, review: &Review) -> Result<Review, AppError>;

    async fn update(&self, review: &Review) -> Result<Review, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;
}
