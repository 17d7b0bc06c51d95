//! # Domain Entities
//!
//! Core business objects of the cinema. All entities map directly to their
//! corresponding database tables.
//!
//! ## Catalog
//!
//! - **Branch**: a cinema location
//! - **Hall / Seat**: a screen room and its seat grid
//! - **Genre / Movie**: what is being shown
//! - **Showtime**: one screening of a movie in a hall
//!
//! ## Sales
//!
//! - **Booking**: a seat hold that becomes a purchase
//! - **Payment**: one provider payment attempt for a booking
//! - **Ticket**: an admission issued per booked seat
//!
//! ## Accounts
//!
//! - **User / Session**: customer and admin accounts with refresh sessions
//! - **Review**: a customer's rating of a movie they watched
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod booking;
mod branch;
mod genre;
mod hall;
mod movie;
mod payment;
mod report;
mod review;
mod session;
mod showtime;
mod ticket;
mod user;

pub use booking::{Booking, BookingContext, BookingFilter, BookingRepository, BookingSeat, BookingStatus};
pub use branch::{Branch, BranchRepository};
pub use genre::{Genre, GenreRepository};
pub use hall::{
    generate_seat_grid, row_index, row_label, Hall, HallRepository, HallType, Seat, SeatType,
    MAX_ROWS, MAX_SEATS_PER_ROW,
};
pub use movie::{
    AgeRating, Movie, MovieFilter, MovieRepository, MovieSort, MovieStatus, RatingSummary,
    MAX_DURATION_MINUTES,
};
pub use payment::{Payment, PaymentRepository, PaymentStatus};
pub use report::{DailyRevenue, MovieSales, ReportRepository, SalesReport};
pub use review::{Review, ReviewRepository, MAX_COMMENT_CHARS};
pub use session::{Session, SessionRepository};
pub use showtime::{
    seat_availability, SeatAvailability, SeatClaim, Showtime, ShowtimeFilter, ShowtimeRepository,
    ShowtimeStatus,
};
pub use ticket::{Ticket, TicketRepository, TicketStatus, TicketView};
pub use user::{User, UserFilter, UserRepository, UserRole};
