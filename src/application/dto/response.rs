//! Response DTOs
//!
//! Data structures for API response bodies. Snowflake ids are rendered as
//! strings so JavaScript clients do not lose precision.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AgeRating, Booking, BookingSeat, BookingStatus, Branch, Genre, Hall, HallType, Money, Movie,
    MovieStatus, Payment, PaymentStatus, RatingSummary, Review, SalesReport, Seat,
    SeatAvailability, SeatType, Showtime, ShowtimeStatus, Ticket, TicketStatus, TicketView, User,
    UserRole,
};

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Registration and login response (user plus tokens)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchResponse {
    pub id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: Option<String>,
    pub is_active: bool,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id.to_string(),
            name: branch.name,
            address: branch.address,
            city: branch.city,
            phone: branch.phone,
            is_active: branch.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HallResponse {
    pub id: String,
    pub branch_id: String,
    pub name: String,
    pub hall_type: HallType,
    pub rows: i32,
    pub seats_per_row: i32,
    pub capacity: i32,
    pub is_active: bool,
}

impl From<Hall> for HallResponse {
    fn from(hall: Hall) -> Self {
        Self {
            id: hall.id.to_string(),
            branch_id: hall.branch_id.to_string(),
            capacity: hall.capacity(),
            name: hall.name,
            hall_type: hall.hall_type,
            rows: hall.rows,
            seats_per_row: hall.seats_per_row,
            is_active: hall.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatResponse {
    pub id: String,
    pub row_label: String,
    pub number: i32,
    pub label: String,
    pub seat_type: SeatType,
    pub is_active: bool,
}

impl From<Seat> for SeatResponse {
    fn from(seat: Seat) -> Self {
        Self {
            id: seat.id.to_string(),
            label: seat.label(),
            row_label: seat.row_label,
            number: seat.number,
            seat_type: seat.seat_type,
            is_active: seat.is_active,
        }
    }
}

/// Hall with its full seat grid
#[derive(Debug, Serialize)]
pub struct HallDetailResponse {
    #[serde(flatten)]
    pub hall: HallResponse,
    pub seats: Vec<SeatResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreResponse {
    pub id: String,
    pub name: String,
}

impl From<Genre> for GenreResponse {
    fn from(genre: Genre) -> Self {
        Self {
            id: genre.id.to_string(),
            name: genre.name,
        }
    }
}

/// Movie listing entry. Also the cached catalog representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub release_date: NaiveDate,
    pub age_rating: AgeRating,
    pub language: String,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub status: MovieStatus,
    pub genres: Vec<GenreResponse>,
}

impl MovieResponse {
    /// Build from a movie, resolving its genre ids against `genres`.
    pub fn from_movie(movie: Movie, genres: &[Genre]) -> Self {
        let genres = genres
            .iter()
            .filter(|g| movie.genre_ids.contains(&g.id))
            .cloned()
            .map(GenreResponse::from)
            .collect();
        Self {
            id: movie.id.to_string(),
            title: movie.title,
            description: movie.description,
            duration_minutes: movie.duration_minutes,
            release_date: movie.release_date,
            age_rating: movie.age_rating,
            language: movie.language,
            poster_url: movie.poster_url,
            trailer_url: movie.trailer_url,
            status: movie.status,
            genres,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieDetailResponse {
    #[serde(flatten)]
    pub movie: MovieResponse,
    /// Rounded to one decimal
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

impl MovieDetailResponse {
    pub fn new(movie: MovieResponse, rating: RatingSummary) -> Self {
        Self {
            movie,
            average_rating: rating.average.map(|avg| (avg * 10.0).round() / 10.0),
            review_count: rating.count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowtimeResponse {
    pub id: String,
    pub movie_id: String,
    pub hall_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub base_price: Money,
    pub status: ShowtimeStatus,
}

impl From<Showtime> for ShowtimeResponse {
    fn from(showtime: Showtime) -> Self {
        Self {
            id: showtime.id.to_string(),
            movie_id: showtime.movie_id.to_string(),
            hall_id: showtime.hall_id.to_string(),
            starts_at: showtime.starts_at,
            ends_at: showtime.ends_at,
            base_price: showtime.base_price,
            status: showtime.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMapEntry {
    pub seat_id: String,
    pub row_label: String,
    pub number: i32,
    pub seat_type: SeatType,
    /// Minor units
    pub price: i64,
    pub availability: SeatAvailability,
}

#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    pub showtime: ShowtimeResponse,
    pub currency: String,
    pub rows: i32,
    pub seats_per_row: i32,
    pub seats: Vec<SeatMapEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingSeatResponse {
    pub seat_id: String,
    pub label: String,
    pub seat_type: SeatType,
    pub price: i64,
}

impl From<BookingSeat> for BookingSeatResponse {
    fn from(seat: BookingSeat) -> Self {
        Self {
            seat_id: seat.seat_id.to_string(),
            label: seat.label(),
            seat_type: seat.seat_type,
            price: seat.price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub booking_code: String,
    pub user_id: String,
    pub showtime_id: String,
    pub status: BookingStatus,
    pub total: Money,
    pub seats: Vec<BookingSeatResponse>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id.to_string(),
            booking_code: booking.booking_code,
            user_id: booking.user_id.to_string(),
            showtime_id: booking.showtime_id.to_string(),
            status: booking.status,
            total: booking.total,
            seats: booking.seats.into_iter().map(BookingSeatResponse::from).collect(),
            expires_at: booking.expires_at,
            confirmed_at: booking.confirmed_at,
            cancelled_at: booking.cancelled_at,
            created_at: booking.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub booking_id: String,
    pub amount: Money,
    pub provider: String,
    pub provider_payment_id: String,
    /// Only returned to the paying customer while the intent is open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        let client_secret = match payment.status {
            PaymentStatus::Pending => payment.client_secret,
            _ => None,
        };
        Self {
            id: payment.id.to_string(),
            booking_id: payment.booking_id.to_string(),
            amount: payment.amount,
            provider: payment.provider,
            provider_payment_id: payment.provider_payment_id,
            client_secret,
            status: payment.status,
            failure_reason: payment.failure_reason,
            paid_at: payment.paid_at,
            refunded_at: payment.refunded_at,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub ticket_code: String,
    pub booking_id: String,
    pub showtime_id: String,
    pub seat_id: String,
    pub status: TicketStatus,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hall_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id.to_string(),
            ticket_code: ticket.ticket_code,
            booking_id: ticket.booking_id.to_string(),
            showtime_id: ticket.showtime_id.to_string(),
            seat_id: ticket.seat_id.to_string(),
            status: ticket.status,
            issued_at: ticket.issued_at,
            used_at: ticket.used_at,
            movie_title: None,
            branch_name: None,
            hall_name: None,
            seat_label: None,
            starts_at: None,
        }
    }
}

impl From<TicketView> for TicketResponse {
    fn from(view: TicketView) -> Self {
        let seat_label = format!("{}{}", view.row_label, view.seat_number);
        Self {
            movie_title: Some(view.movie_title),
            branch_name: Some(view.branch_name),
            hall_name: Some(view.hall_name),
            seat_label: Some(seat_label),
            starts_at: Some(view.starts_at),
            ..TicketResponse::from(view.ticket)
        }
    }
}

/// Result of confirming a payment
#[derive(Debug, Serialize)]
pub struct PaymentConfirmationResponse {
    pub payment: PaymentResponse,
    pub booking: BookingResponse,
    pub tickets: Vec<TicketResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub id: String,
    pub movie_id: String,
    pub user_id: String,
    pub author_name: Option<String>,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id.to_string(),
            movie_id: review.movie_id.to_string(),
            user_id: review.user_id.to_string(),
            author_name: review.author_name,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenueResponse {
    pub day: NaiveDate,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopMovieResponse {
    pub movie_id: String,
    pub title: String,
    pub tickets_sold: i64,
    pub revenue: i64,
}

/// Admin dashboard. Amounts are minor units of `currency`.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub days: i64,
    pub currency: String,
    pub gross_revenue: i64,
    pub refunded: i64,
    pub net_revenue: i64,
    pub bookings_by_status: BTreeMap<String, i64>,
    pub tickets_sold: i64,
    pub active_movies: i64,
    pub upcoming_showtimes: i64,
    pub revenue_by_day: Vec<DailyRevenueResponse>,
    pub top_movies: Vec<TopMovieResponse>,
}

impl DashboardResponse {
    pub fn from_report(report: SalesReport, days: i64, currency: &str) -> Self {
        Self {
            days,
            currency: currency.to_string(),
            net_revenue: report.gross_revenue - report.refunded,
            gross_revenue: report.gross_revenue,
            refunded: report.refunded,
            bookings_by_status: report.bookings_by_status.into_iter().collect(),
            tickets_sold: report.tickets_sold,
            active_movies: report.active_movies,
            upcoming_showtimes: report.upcoming_showtimes,
            revenue_by_day: report
                .revenue_by_day
                .into_iter()
                .map(|d| DailyRevenueResponse {
                    day: d.day,
                    amount: d.amount,
                })
                .collect(),
            top_movies: report
                .top_movies
                .into_iter()
                .map(|m| TopMovieResponse {
                    movie_id: m.movie_id.to_string(),
                    title: m.title,
                    tickets_sold: m.tickets_sold,
                    revenue: m.revenue,
                })
                .collect(),
        }
    }
}

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_movie_response_resolves_genres() {
        let now = Utc::now();
        let movie = Movie {
            id: 10,
            title: "Arrival".into(),
            description: String::new(),
            duration_minutes: 116,
            release_date: NaiveDate::from_ymd_opt(2016, 11, 11).unwrap(),
            age_rating: AgeRating::Pg13,
            language: "en".into(),
            poster_url: None,
            trailer_url: None,
            status: MovieStatus::NowShowing,
            genre_ids: vec![2],
            created_at: now,
            updated_at: now,
        };
        let genres = vec![
            Genre { id: 1, name: "Comedy".into() },
            Genre { id: 2, name: "Sci-Fi".into() },
        ];

        let response = MovieResponse::from_movie(movie, &genres);
        assert_eq!(response.id, "10");
        assert_eq!(response.genres, vec![GenreResponse { id: "2".into(), name: "Sci-Fi".into() }]);
    }

    #[test]
    fn test_average_rating_rounded() {
        let detail = MovieDetailResponse::new(
            MovieResponse {
                id: "1".into(),
                title: "T".into(),
                description: String::new(),
                duration_minutes: 90,
                release_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                age_rating: AgeRating::G,
                language: "en".into(),
                poster_url: None,
                trailer_url: None,
                status: MovieStatus::NowShowing,
                genres: vec![],
            },
            RatingSummary {
                average: Some(4.333333),
                count: 3,
            },
        );
        assert_eq!(detail.average_rating, Some(4.3));
    }

    #[test]
    fn test_client_secret_hidden_once_settled() {
        let now = Utc::now();
        let mut payment = Payment {
            id: 1,
            booking_id: 2,
            user_id: 3,
            amount: Money::new(1000, "usd"),
            provider: "mock".into(),
            provider_payment_id: "pi_1".into(),
            client_secret: Some("pi_1_secret".into()),
            status: PaymentStatus::Pending,
            failure_reason: None,
            refund_id: None,
            paid_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(PaymentResponse::from(payment.clone()).client_secret.is_some());

        payment.mark_succeeded(now);
        let json = serde_json::to_value(PaymentResponse::from(payment)).unwrap();
        assert!(json.get("client_secret").is_none());
        assert_eq!(json["id"], "1");
    }
}
