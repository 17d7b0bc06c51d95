//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! Each repository handles data access for one entity type. Writes that
//! must land together with others (bookings, seat rows, payments during
//! the saga, tickets) go through `PgTransactionScope` instead and reuse
//! the row types defined here.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgMovieRepository, PgShowtimeRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let movies = PgMovieRepository::new(pool.clone());
//!     let showtimes = PgShowtimeRepository::new(pool.clone());
//! }
//! ```

// Accounts
pub mod session_repository;
pub mod user_repository;

// Catalog
pub mod branch_repository;
pub mod genre_repository;
pub mod hall_repository;
pub mod movie_repository;
pub mod showtime_repository;

// Sales
pub mod booking_repository;
pub mod payment_repository;
pub mod report_repository;
pub mod review_repository;
pub mod ticket_repository;

pub use booking_repository::PgBookingRepository;
pub use branch_repository::PgBranchRepository;
pub use genre_repository::PgGenreRepository;
pub use hall_repository::PgHallRepository;
pub use movie_repository::PgMovieRepository;
pub use payment_repository::PgPaymentRepository;
pub use report_repository::PgReportRepository;
pub use review_repository::PgReviewRepository;
pub use session_repository::PgSessionRepository;
pub use showtime_repository::PgShowtimeRepository;
pub use ticket_repository::PgTicketRepository;
pub use user_repository::PgUserRepository;
