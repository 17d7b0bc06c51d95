//! Review Service
//!
//! Only customers holding a confirmed booking for a movie may review it,
//! once per movie.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use super::Actor;
use crate::application::dto::request::{CreateReviewRequest, UpdateReviewRequest};
use crate::application::dto::response::ReviewResponse;
use crate::domain::{BookingRepository, MovieRepository, Review, ReviewRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageParams};
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::validate;

#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Newest first
    async fn list_by_movie(&self, movie_id: i64, page: PageParams)
        -> Result<Page<ReviewResponse>, ReviewError>;

    async fn create(
        &self,
        actor: Actor,
        movie_id: i64,
        request: CreateReviewRequest,
    ) -> Result<ReviewResponse, ReviewError>;

    async fn update(
        &self,
        actor: Actor,
        id: i64,
        request: UpdateReviewRequest,
    ) -> Result<ReviewResponse, ReviewError>;

    /// Authors delete their own reviews, admins moderate any
    async fn delete(&self, actor: Actor, id: i64) -> Result<(), ReviewError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Review not found")]
    NotFound,

    #[error("Movie not found")]
    MovieNotFound,

    #[error("Only customers with a confirmed booking can review this movie")]
    NotEligible,

    #[error("You have already reviewed this movie")]
    AlreadyReviewed,

    #[error("You can only change your own reviews")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotFound | ReviewError::MovieNotFound => AppError::NotFound(err.to_string()),
            ReviewError::NotEligible | ReviewError::Forbidden => AppError::Forbidden(err.to_string()),
            ReviewError::AlreadyReviewed => AppError::Conflict(err.to_string()),
            ReviewError::Repository(e) => e,
        }
    }
}

/// Trim a comment; blank means no comment.
fn clean_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

pub struct ReviewServiceImpl<R, M, B>
where
    R: ReviewRepository,
    M: MovieRepository,
    B: BookingRepository,
{
    review_repo: Arc<R>,
    movie_repo: Arc<M>,
    booking_repo: Arc<B>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R, M, B> ReviewServiceImpl<R, M, B>
where
    R: ReviewRepository,
    M: MovieRepository,
    B: BookingRepository,
{
    pub fn new(
        review_repo: Arc<R>,
        movie_repo: Arc<M>,
        booking_repo: Arc<B>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            review_repo,
            movie_repo,
            booking_repo,
            id_generator,
        }
    }

    async fn require_movie(&self, movie_id: i64) -> Result<(), ReviewError> {
        self.movie_repo
            .find_by_id(movie_id)
            .await?
            .map(|_| ())
            .ok_or(ReviewError::MovieNotFound)
    }

    async fn load(&self, id: i64) -> Result<Review, ReviewError> {
        self.review_repo.find_by_id(id).await?.ok_or(ReviewError::NotFound)
    }
}

#[async_trait]
impl<R, M, B> ReviewService for ReviewServiceImpl<R, M, B>
where
    R: ReviewRepository + 'static,
    M: MovieRepository + 'static,
    B: BookingRepository + 'static,
{
    async fn list_by_movie(
        &self,
        movie_id: i64,
        page: PageParams,
    ) -> Result<Page<ReviewResponse>, ReviewError> {
        self.require_movie(movie_id).await?;
        let (reviews, total) = self.review_repo.list_by_movie(movie_id, page).await?;
        Ok(Page::new(reviews, page, total).map(ReviewResponse::from))
    }

    async fn create(
        &self,
        actor: Actor,
        movie_id: i64,
        request: CreateReviewRequest,
    ) -> Result<ReviewResponse, ReviewError> {
        validate(&request)?;
        self.require_movie(movie_id).await?;

        if !self
            .booking_repo
            .has_confirmed_for_movie(actor.user_id, movie_id)
            .await?
        {
            return Err(ReviewError::NotEligible);
        }

        let now = Utc::now();
        let review = Review {
            id: self.id_generator.generate(),
            user_id: actor.user_id,
            movie_id,
            rating: request.rating,
            comment: clean_comment(request.comment),
            author_name: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.review_repo.create(&review).await.map_err(|e| match e {
            AppError::Conflict(_) => ReviewError::AlreadyReviewed,
            other => other.into(),
        })?;
        info!(review_id = created.id, movie_id, user_id = actor.user_id, "Review posted");
        Ok(created.into())
    }

    async fn update(
        &self,
        actor: Actor,
        id: i64,
        request: UpdateReviewRequest,
    ) -> Result<ReviewResponse, ReviewError> {
        validate(&request)?;
        let mut review = self.load(id).await?;
        if review.user_id != actor.user_id {
            return Err(ReviewError::Forbidden);
        }

        if let Some(rating) = request.rating {
            review.rating = rating;
        }
        if request.comment.is_some() {
            review.comment = clean_comment(request.comment);
        }
        review.updated_at = Utc::now();

        Ok(self.review_repo.update(&review).await?.into())
    }

    async fn delete(&self, actor: Actor, id: i64) -> Result<(), ReviewError> {
        let review = self.load(id).await?;
        if !actor.can_access(review.user_id) {
            return Err(ReviewError::Forbidden);
        }
        self.review_repo.delete(id).await?;
        info!(review_id = id, by = actor.user_id, "Review deleted");
        Ok(())
    }
}
