//! Request DTOs
//!
//! Data structures for API request bodies and query strings. Snowflake ids
//! arrive as strings and are parsed by the services.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::domain::{AgeRating, BookingStatus, HallType, MovieSort, MovieStatus, PaymentStatus, SeatType, UserRole};
use crate::shared::pagination::PageParams;

// ---- Auth & users -------------------------------------------------------

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 2, max = 100, message = "Full name must be 2-100 characters"))]
    pub full_name: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh or logout request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Own profile update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "Full name must be 2-100 characters"))]
    pub full_name: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

/// Admin update of another account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

// ---- Catalog ------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBranchRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "Address must be 1-255 characters"))]
    pub address: String,

    #[validate(length(min = 1, max = 100, message = "City must be 1-100 characters"))]
    pub city: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBranchRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Address must be 1-255 characters"))]
    pub address: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City must be 1-100 characters"))]
    pub city: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchListQuery {
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateHallRequest {
    pub branch_id: String,

    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    #[serde(default)]
    pub hall_type: HallType,

    #[validate(range(min = 1, max = 26, message = "Rows must be between 1 and 26"))]
    pub rows: i32,

    #[validate(range(min = 1, max = 50, message = "Seats per row must be between 1 and 50"))]
    pub seats_per_row: i32,

    #[serde(default)]
    pub vip_rows: Vec<String>,

    #[serde(default)]
    pub couple_rows: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateHallRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,

    pub hall_type: Option<HallType>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSeatRequest {
    pub seat_type: Option<SeatType>,
    pub is_active: Option<bool>,
}

/// Create or rename a genre
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenreRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMovieRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    #[serde(default)]
    pub description: String,

    #[validate(range(min = 1, max = 600, message = "Duration must be between 1 and 600 minutes"))]
    pub duration_minutes: i32,

    pub release_date: NaiveDate,

    #[serde(default)]
    pub age_rating: AgeRating,

    #[validate(length(min = 2, max = 50, message = "Language must be 2-50 characters"))]
    pub language: String,

    #[validate(url(message = "Poster URL must be a valid URL"))]
    pub poster_url: Option<String>,

    #[validate(url(message = "Trailer URL must be a valid URL"))]
    pub trailer_url: Option<String>,

    #[serde(default)]
    pub status: MovieStatus,

    #[serde(default)]
    pub genre_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMovieRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 1, max = 600, message = "Duration must be between 1 and 600 minutes"))]
    pub duration_minutes: Option<i32>,

    pub release_date: Option<NaiveDate>,

    pub age_rating: Option<AgeRating>,

    #[validate(length(min = 2, max = 50, message = "Language must be 2-50 characters"))]
    pub language: Option<String>,

    #[validate(url(message = "Poster URL must be a valid URL"))]
    pub poster_url: Option<String>,

    #[validate(url(message = "Trailer URL must be a valid URL"))]
    pub trailer_url: Option<String>,

    pub status: Option<MovieStatus>,

    pub genre_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieListQuery {
    pub search: Option<String>,
    pub genre_id: Option<String>,
    pub status: Option<MovieStatus>,
    pub sort: Option<MovieSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShowtimeRequest {
    pub movie_id: String,
    pub hall_id: String,
    pub starts_at: DateTime<Utc>,

    /// Minor units
    #[validate(range(
        min = 1,
        max = 100_000_000,
        message = "Base price must be between 1 and 100000000 minor units"
    ))]
    pub base_price: i64,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowtimeListQuery {
    pub movie_id: Option<String>,
    pub branch_id: Option<String>,
    pub hall_id: Option<String>,
    /// UTC calendar day, `YYYY-MM-DD`
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub upcoming: bool,
}

// ---- Sales --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub showtime_id: String,
    pub seat_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub showtime_id: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub days: Option<i64>,
}

/// Page parameters carried by list queries.
pub trait Paged {
    fn page_params(&self) -> PageParams;
}

macro_rules! impl_paged {
    ($($ty:ty),*) => {
        $(impl Paged for $ty {
            fn page_params(&self) -> PageParams {
                PageParams {
                    page: self.page,
                    per_page: self.per_page,
                }
            }
        })*
    };
}

impl_paged!(UserListQuery, MovieListQuery, BookingListQuery, PaymentListQuery);
