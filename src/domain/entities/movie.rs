//! Movie entity and repository trait.
//!
//! Maps to the `movies` table plus the `movie_genres` join table.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

pub const MAX_DURATION_MINUTES: i32 = 600;

/// MPA-style age rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgeRating {
    #[default]
    G,
    Pg,
    Pg13,
    R,
    Nc17,
}

impl AgeRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G => "g",
            Self::Pg => "pg",
            Self::Pg13 => "pg13",
            Self::R => "r",
            Self::Nc17 => "nc17",
        }
    }
}

impl std::str::FromStr for AgeRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "g" => Ok(Self::G),
            "pg" => Ok(Self::Pg),
            "pg13" => Ok(Self::Pg13),
            "r" => Ok(Self::R),
            "nc17" => Ok(Self::Nc17),
            other => Err(format!("Unknown age rating '{}'", other)),
        }
    }
}

/// Release lifecycle of a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovieStatus {
    #[default]
    ComingSoon,
    NowShowing,
    Ended,
}

impl MovieStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComingSoon => "coming_soon",
            Self::NowShowing => "now_showing",
            Self::Ended => "ended",
        }
    }
}

impl std::str::FromStr for MovieStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coming_soon" => Ok(Self::ComingSoon),
            "now_showing" => Ok(Self::NowShowing),
            "ended" => Ok(Self::Ended),
            other => Err(format!("Unknown movie status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub release_date: NaiveDate,
    pub age_rating: AgeRating,
    pub language: String,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub status: MovieStatus,
    /// Genres attached through `movie_genres`
    pub genre_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sort order for movie listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieSort {
    #[default]
    ReleaseDateDesc,
    ReleaseDateAsc,
    Title,
}

#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    pub genre_id: Option<i64>,
    pub status: Option<MovieStatus>,
    pub sort: MovieSort,
}

/// Average rating and review count for a movie.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Movie>, AppError>;

    async fn list(&self, filter: &MovieFilter, page: PageParams)
        -> Result<(Vec<Movie>, i64), AppError>;

    /// Every movie in a status, newest release first.
    async fn list_by_status(&self, status: MovieStatus) -> Result<Vec<Movie>, AppError>;

    /// Insert the movie with its genre links.
    async fn create(&self, movie: &Movie) -> Result<Movie, AppError>;

    /// Update the movie and replace its genre links.
    async fn update(&self, movie: &Movie) -> Result<Movie, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    async fn has_showtimes(&self, id: i64) -> Result<bool, AppError>;

    async fn rating_summary(&self, id: i64) -> Result<RatingSummary, AppError>;
}
