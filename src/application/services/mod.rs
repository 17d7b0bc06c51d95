//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, login, JWT tokens, refresh rotation
//! - **UserService**: Profiles, passwords and admin account management
//! - **BranchService / HallService / GenreService**: Catalog back office
//! - **MovieService**: Movie catalog with cached listings
//! - **ShowtimeService**: Scheduling, seat maps and showtime cancellation
//! - **BookingService**: Seat holds, cancellations and hold expiry
//! - **PaymentService**: Payment intents, confirmation, webhooks and refunds
//! - **TicketService**: Ticket lookup and check-in
//! - **ReviewService**: Movie reviews by customers who watched
//! - **EmailService**: Transactional email rendering
//! - **DashboardService**: Admin sales summary

pub mod auth_service;
pub mod booking_service;
pub mod branch_service;
pub mod dashboard_service;
pub mod email_service;
pub mod genre_service;
pub mod hall_service;
pub mod movie_service;
pub mod payment_service;
pub mod review_service;
pub mod showtime_service;
pub mod ticket_service;
pub mod user_service;

mod settlement;

#[cfg(test)]
pub(crate) mod test_support;

use crate::domain::UserRole;

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Owners and admins may see a resource.
    pub fn can_access(&self, owner_id: i64) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

pub use auth_service::{AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims};
pub use booking_service::{BookingError, BookingService, BookingServiceImpl, CreatedBooking};
pub use branch_service::{BranchError, BranchService, BranchServiceImpl};
pub use dashboard_service::{DashboardError, DashboardService, DashboardServiceImpl};
pub use email_service::EmailService;
pub use genre_service::{GenreError, GenreService, GenreServiceImpl};
pub use hall_service::{HallError, HallService, HallServiceImpl};
pub use movie_service::{MovieError, MovieService, MovieServiceImpl};
pub use payment_service::{PaymentError, PaymentService, PaymentServiceImpl};
pub use review_service::{ReviewError, ReviewService, ReviewServiceImpl};
pub use showtime_service::{ShowtimeError, ShowtimeService, ShowtimeServiceImpl};
pub use ticket_service::{TicketError, TicketService, TicketServiceImpl};
pub use user_service::{UserError, UserService, UserServiceImpl};
