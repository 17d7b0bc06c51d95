//! In-memory repositories and fixtures for service tests.
//!
//! `InMemoryDb` implements every repository trait plus `UnitOfWork` over one
//! shared state. A transaction works on a copy of that state and publishes
//! it on commit, so dropping a scope discards its writes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use super::auth_service::hash_password;
use super::Actor;
use crate::config::{BookingSettings, JwtSettings};
use crate::domain::services::{pricing, PaymentGateway};
use crate::domain::{
    generate_seat_grid, AgeRating, Booking, BookingContext, BookingFilter, BookingRepository,
    BookingSeat, BookingStatus, Branch, BranchRepository, DailyRevenue, Genre, GenreRepository,
    Hall, HallRepository, HallType, Money, Movie, MovieFilter, MovieRepository, MovieSales,
    MovieSort, MovieStatus, Payment, PaymentRepository, PaymentStatus, RatingSummary,
    ReportRepository, Review, ReviewRepository, SalesReport, Seat, SeatClaim, SeatType, Session,
    SessionRepository, Showtime, ShowtimeFilter, ShowtimeRepository, ShowtimeStatus, Ticket,
    TicketRepository, TicketStatus, TicketView, TransactionScope, UnitOfWork, User, UserFilter,
    UserRepository, UserRole,
};
use crate::infrastructure::cache::Cache;
use crate::shared::codes;
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;
use crate::shared::snowflake::SnowflakeGenerator;

#[derive(Debug, Clone, Default)]
struct State {
    users: BTreeMap<i64, User>,
    sessions: BTreeMap<Uuid, Session>,
    branches: BTreeMap<i64, Branch>,
    halls: BTreeMap<i64, Hall>,
    seats: BTreeMap<i64, Seat>,
    genres: BTreeMap<i64, Genre>,
    movies: BTreeMap<i64, Movie>,
    showtimes: BTreeMap<i64, Showtime>,
    bookings: BTreeMap<i64, Booking>,
    /// Bookings whose seat rows no longer block resale
    released: BTreeSet<i64>,
    payments: BTreeMap<i64, Payment>,
    tickets: BTreeMap<i64, Ticket>,
    reviews: BTreeMap<i64, Review>,
}

impl State {
    fn claims_seats(&self, booking: &Booking) -> bool {
        booking.status.holds_seats() && !self.released.contains(&booking.id)
    }

    fn taken_seats(&self, showtime_id: i64, seat_ids: &[i64]) -> Vec<i64> {
        self.bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && self.claims_seats(b))
            .flat_map(|b| b.seat_ids())
            .filter(|id| seat_ids.contains(id))
            .collect()
    }

    fn set_booking_status(&mut self, id: i64, status: BookingStatus, at: DateTime<Utc>) {
        if let Some(booking) = self.bookings.get_mut(&id) {
            booking.status = status;
            booking.updated_at = at;
            match status {
                BookingStatus::Confirmed => booking.confirmed_at = Some(at),
                BookingStatus::Cancelled => booking.cancelled_at = Some(at),
                _ => {}
            }
        }
    }

    fn context(&self, booking: &Booking) -> Option<BookingContext> {
        let user = self.users.get(&booking.user_id)?;
        let showtime = self.showtimes.get(&booking.showtime_id)?;
        let movie = self.movies.get(&showtime.movie_id)?;
        let hall = self.halls.get(&showtime.hall_id)?;
        let branch = self.branches.get(&hall.branch_id)?;
        Some(BookingContext {
            booking: booking.clone(),
            user_email: user.email.clone(),
            user_name: user.full_name.clone(),
            movie_id: movie.id,
            movie_title: movie.title.clone(),
            hall_name: hall.name.clone(),
            branch_name: branch.name.clone(),
            starts_at: showtime.starts_at,
        })
    }

    fn ticket_view(&self, ticket: &Ticket) -> Option<TicketView> {
        let showtime = self.showtimes.get(&ticket.showtime_id)?;
        let movie = self.movies.get(&showtime.movie_id)?;
        let hall = self.halls.get(&showtime.hall_id)?;
        let branch = self.branches.get(&hall.branch_id)?;
        let seat = self.seats.get(&ticket.seat_id)?;
        Some(TicketView {
            ticket: ticket.clone(),
            movie_title: movie.title.clone(),
            branch_name: branch.name.clone(),
            hall_name: hall.name.clone(),
            row_label: seat.row_label.clone(),
            seat_number: seat.number,
            starts_at: showtime.starts_at,
            ends_at: showtime.ends_at,
        })
    }

    fn with_author(&self, review: &Review) -> Review {
        Review {
            author_name: self.users.get(&review.user_id).map(|u| u.full_name.clone()),
            ..review.clone()
        }
    }
}

fn paginate<T>(items: Vec<T>, page: PageParams) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (items, total)
}

fn conflict(what: &str) -> AppError {
    AppError::Conflict(format!("{} already exists", what))
}

fn missing(what: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} {} not found", what, id))
}

/// Shared in-memory store behind every repository trait.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryDb {
    state: Arc<Mutex<State>>,
}

impl InMemoryDb {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_user_active(&self, id: i64, active: bool) {
        if let Some(user) = self.state().users.get_mut(&id) {
            user.is_active = active;
        }
    }

    pub(crate) fn set_booking_status(&self, id: i64, status: BookingStatus) {
        let mut state = self.state();
        state.set_booking_status(id, status, Utc::now());
        if !status.holds_seats() {
            state.released.insert(id);
        }
    }

    pub(crate) fn booking(&self, id: i64) -> Booking {
        self.state().bookings[&id].clone()
    }

    pub(crate) fn payment(&self, id: i64) -> Payment {
        self.state().payments[&id].clone()
    }

    pub(crate) fn movie(&self, id: i64) -> Movie {
        self.state().movies[&id].clone()
    }

    pub(crate) fn tickets_for(&self, booking_id: i64) -> Vec<Ticket> {
        self.state()
            .tickets
            .values()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

// ---- Users & sessions ---------------------------------------------------

#[async_trait]
impl UserRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.state().users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        let mut state = self.state();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(conflict("Email"));
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut state = self.state();
        let slot = state.users.get_mut(&user.id).ok_or_else(|| missing("User", user.id))?;
        *slot = user.clone();
        Ok(user.clone())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let mut state = self.state();
        let user = state.users.get_mut(&id).ok_or_else(|| missing("User", id))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.state().users.remove(&id);
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.state().users.values().any(|u| u.email == email))
    }

    async fn list(&self, filter: &UserFilter, page: PageParams) -> Result<(Vec<User>, i64), AppError> {
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut users: Vec<User> = self
            .state()
            .users
            .values()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| {
                search.as_ref().is_none_or(|s| {
                    u.email.to_lowercase().contains(s) || u.full_name.to_lowercase().contains(s)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(users, page))
    }

    async fn has_bookings(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state().bookings.values().any(|b| b.user_id == id))
    }
}

#[async_trait]
impl SessionRepository for InMemoryDb {
    async fn create(&self, session: &Session) -> Result<Session, AppError> {
        self.state().sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        Ok(self
            .state()
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == token_hash && s.revoked_at.is_none())
            .cloned())
    }

    async fn rotate(&self, id: Uuid, new_token_hash: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state();
        if let Some(session) = state.sessions.get_mut(&id) {
            session.refresh_token_hash = new_token_hash.to_string();
            session.expires_at = expires_at;
            session.last_used_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(session) = self.state().sessions.get_mut(&id) {
            session.revoked_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self.state().sessions.values_mut() {
            if session.user_id == user_id && session.revoked_at.is_none() {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

// ---- Catalog ------------------------------------------------------------

#[async_trait]
impl BranchRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Branch>, AppError> {
        Ok(self.state().branches.get(&id).cloned())
    }

    async fn list(&self, active_only: bool, city: Option<&str>) -> Result<Vec<Branch>, AppError> {
        let mut branches: Vec<Branch> = self
            .state()
            .branches
            .values()
            .filter(|b| !active_only || b.is_active)
            .filter(|b| city.is_none_or(|c| b.city.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    async fn create(&self, branch: &Branch) -> Result<Branch, AppError> {
        let mut state = self.state();
        if state.branches.values().any(|b| b.name == branch.name) {
            return Err(conflict("Branch"));
        }
        state.branches.insert(branch.id, branch.clone());
        Ok(branch.clone())
    }

    async fn update(&self, branch: &Branch) -> Result<Branch, AppError> {
        let mut state = self.state();
        if state.branches.values().any(|b| b.id != branch.id && b.name == branch.name) {
            return Err(conflict("Branch"));
        }
        state.branches.insert(branch.id, branch.clone());
        Ok(branch.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.state().branches.remove(&id);
        Ok(())
    }

    async fn has_halls(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state().halls.values().any(|h| h.branch_id == id))
    }
}

#[async_trait]
impl HallRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Hall>, AppError> {
        Ok(self.state().halls.get(&id).cloned())
    }

    async fn list_by_branch(&self, branch_id: i64, active_only: bool) -> Result<Vec<Hall>, AppError> {
        Ok(self
            .state()
            .halls
            .values()
            .filter(|h| h.branch_id == branch_id && (!active_only || h.is_active))
            .cloned()
            .collect())
    }

    async fn create_with_seats(&self, hall: &Hall, seats: &[Seat]) -> Result<Hall, AppError> {
        let mut state = self.state();
        if state
            .halls
            .values()
            .any(|h| h.branch_id == hall.branch_id && h.name == hall.name)
        {
            return Err(conflict("Hall"));
        }
        state.halls.insert(hall.id, hall.clone());
        for seat in seats {
            state.seats.insert(seat.id, seat.clone());
        }
        Ok(hall.clone())
    }

    async fn update(&self, hall: &Hall) -> Result<Hall, AppError> {
        self.state().halls.insert(hall.id, hall.clone());
        Ok(hall.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut state = self.state();
        state.halls.remove(&id);
        state.seats.retain(|_, s| s.hall_id != id);
        Ok(())
    }

    async fn has_showtimes(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state().showtimes.values().any(|s| s.hall_id == id))
    }

    async fn seats(&self, hall_id: i64) -> Result<Vec<Seat>, AppError> {
        let mut seats: Vec<Seat> = self
            .state()
            .seats
            .values()
            .filter(|s| s.hall_id == hall_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| (&a.row_label, a.number).cmp(&(&b.row_label, b.number)));
        Ok(seats)
    }

    async fn find_seat(&self, seat_id: i64) -> Result<Option<Seat>, AppError> {
        Ok(self.state().seats.get(&seat_id).cloned())
    }

    async fn find_seats(&self, hall_id: i64, seat_ids: &[i64]) -> Result<Vec<Seat>, AppError> {
        Ok(self
            .state()
            .seats
            .values()
            .filter(|s| s.hall_id == hall_id && seat_ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn update_seat(&self, seat: &Seat) -> Result<Seat, AppError> {
        self.state().seats.insert(seat.id, seat.clone());
        Ok(seat.clone())
    }
}

#[async_trait]
impl GenreRepository for InMemoryDb {
    async fn list(&self) -> Result<Vec<Genre>, AppError> {
        let mut genres: Vec<Genre> = self.state().genres.values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Genre>, AppError> {
        Ok(self.state().genres.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Genre>, AppError> {
        Ok(self
            .state()
            .genres
            .values()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn create(&self, genre: &Genre) -> Result<Genre, AppError> {
        let mut state = self.state();
        if state.genres.values().any(|g| g.name.eq_ignore_ascii_case(&genre.name)) {
            return Err(conflict("Genre"));
        }
        state.genres.insert(genre.id, genre.clone());
        Ok(genre.clone())
    }

    async fn update(&self, genre: &Genre) -> Result<Genre, AppError> {
        let mut state = self.state();
        if state
            .genres
            .values()
            .any(|g| g.id != genre.id && g.name.eq_ignore_ascii_case(&genre.name))
        {
            return Err(conflict("Genre"));
        }
        state.genres.insert(genre.id, genre.clone());
        Ok(genre.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut state = self.state();
        state.genres.remove(&id);
        for movie in state.movies.values_mut() {
            movie.genre_ids.retain(|g| *g != id);
        }
        Ok(())
    }
}

#[async_trait]
impl MovieRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Movie>, AppError> {
        Ok(self.state().movies.get(&id).cloned())
    }

    async fn list(&self, filter: &MovieFilter, page: PageParams) -> Result<(Vec<Movie>, i64), AppError> {
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut movies: Vec<Movie> = self
            .state()
            .movies
            .values()
            .filter(|m| search.as_ref().is_none_or(|s| m.title.to_lowercase().contains(s)))
            .filter(|m| filter.genre_id.is_none_or(|g| m.genre_ids.contains(&g)))
            .filter(|m| filter.status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();
        match filter.sort {
            MovieSort::ReleaseDateDesc => {
                movies.sort_by(|a, b| (b.release_date, b.id).cmp(&(a.release_date, a.id)))
            }
            MovieSort::ReleaseDateAsc => movies.sort_by_key(|m| (m.release_date, m.id)),
            MovieSort::Title => movies.sort_by_key(|m| (m.title.to_lowercase(), m.id)),
        }
        Ok(paginate(movies, page))
    }

    async fn list_by_status(&self, status: MovieStatus) -> Result<Vec<Movie>, AppError> {
        let mut movies: Vec<Movie> = self
            .state()
            .movies
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        movies.sort_by(|a, b| (b.release_date, b.id).cmp(&(a.release_date, a.id)));
        Ok(movies)
    }

    async fn create(&self, movie: &Movie) -> Result<Movie, AppError> {
        self.state().movies.insert(movie.id, movie.clone());
        Ok(movie.clone())
    }

    async fn update(&self, movie: &Movie) -> Result<Movie, AppError> {
        self.state().movies.insert(movie.id, movie.clone());
        Ok(movie.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.state().movies.remove(&id);
        Ok(())
    }

    async fn has_showtimes(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state().showtimes.values().any(|s| s.movie_id == id))
    }

    async fn rating_summary(&self, id: i64) -> Result<RatingSummary, AppError> {
        let ratings: Vec<f64> = self
            .state()
            .reviews
            .values()
            .filter(|r| r.movie_id == id)
            .map(|r| r.rating as f64)
            .collect();
        let count = ratings.len() as i64;
        let average = (count > 0).then(|| {
            let avg = ratings.iter().sum::<f64>() / count as f64;
            (avg * 10.0).round() / 10.0
        });
        Ok(RatingSummary { average, count })
    }
}

#[async_trait]
impl ShowtimeRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Showtime>, AppError> {
        Ok(self.state().showtimes.get(&id).cloned())
    }

    async fn list(&self, filter: &ShowtimeFilter) -> Result<Vec<Showtime>, AppError> {
        let state = self.state();
        let mut showtimes: Vec<Showtime> = state
            .showtimes
            .values()
            .filter(|s| filter.movie_id.is_none_or(|id| s.movie_id == id))
            .filter(|s| filter.hall_id.is_none_or(|id| s.hall_id == id))
            .filter(|s| {
                filter
                    .branch_id
                    .is_none_or(|id| state.halls.get(&s.hall_id).is_some_and(|h| h.branch_id == id))
            })
            .filter(|s| filter.date.is_none_or(|d| s.starts_at.date_naive() == d))
            .filter(|s| {
                filter
                    .upcoming_after
                    .is_none_or(|after| s.starts_at > after && s.is_scheduled())
            })
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| (s.starts_at, s.id));
        Ok(showtimes)
    }

    async fn seat_claims(&self, showtime_id: i64) -> Result<Vec<SeatClaim>, AppError> {
        let state = self.state();
        Ok(state
            .bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && state.claims_seats(b))
            .flat_map(|b| {
                b.seats.iter().map(|seat| SeatClaim {
                    seat_id: seat.seat_id,
                    status: b.status,
                    expires_at: b.expires_at,
                })
            })
            .collect())
    }
}

// ---- Sales --------------------------------------------------------------

#[async_trait]
impl BookingRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError> {
        Ok(self.state().bookings.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, user_id: i64, key: &str) -> Result<Option<Booking>, AppError> {
        Ok(self
            .state()
            .bookings
            .values()
            .find(|b| b.user_id == user_id && b.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn list(&self, filter: &BookingFilter, page: PageParams) -> Result<(Vec<Booking>, i64), AppError> {
        let mut bookings: Vec<Booking> = self
            .state()
            .bookings
            .values()
            .filter(|b| filter.user_id.is_none_or(|id| b.user_id == id))
            .filter(|b| filter.showtime_id.is_none_or(|id| b.showtime_id == id))
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(bookings, page))
    }

    async fn find_context(&self, id: i64) -> Result<Option<BookingContext>, AppError> {
        let state = self.state();
        Ok(state.bookings.get(&id).and_then(|b| state.context(b)))
    }

    async fn has_confirmed_for_movie(&self, user_id: i64, movie_id: i64) -> Result<bool, AppError> {
        let state = self.state();
        Ok(state.bookings.values().any(|b| {
            b.user_id == user_id
                && b.status == BookingStatus::Confirmed
                && state
                    .showtimes
                    .get(&b.showtime_id)
                    .is_some_and(|s| s.movie_id == movie_id)
        }))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, AppError> {
        Ok(self.state().payments.get(&id).cloned())
    }

    async fn find_by_provider_id(&self, provider_payment_id: &str) -> Result<Option<Payment>, AppError> {
        Ok(self
            .state()
            .payments
            .values()
            .find(|p| p.provider_payment_id == provider_payment_id)
            .cloned())
    }

    async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .state()
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.created_at, p.id));
        Ok(payments)
    }

    async fn list(&self, status: Option<PaymentStatus>, page: PageParams) -> Result<(Vec<Payment>, i64), AppError> {
        let mut payments: Vec<Payment> = self
            .state()
            .payments
            .values()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        payments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(payments, page))
    }

    async fn save(&self, payment: &Payment) -> Result<(), AppError> {
        self.state().payments.insert(payment.id, payment.clone());
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for InMemoryDb {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<TicketView>, AppError> {
        let state = self.state();
        let mut views: Vec<TicketView> = state
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .filter_map(|t| state.ticket_view(t))
            .collect();
        views.sort_by(|a, b| {
            (a.starts_at, &a.row_label, a.seat_number).cmp(&(b.starts_at, &b.row_label, b.seat_number))
        });
        Ok(views)
    }

    async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Ticket>, AppError> {
        let mut tickets = self.tickets_for(booking_id);
        tickets.sort_by_key(|t| (t.issued_at, t.id));
        Ok(tickets)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<TicketView>, AppError> {
        let state = self.state();
        Ok(state
            .tickets
            .values()
            .find(|t| t.ticket_code == code)
            .and_then(|t| state.ticket_view(t)))
    }

    async fn mark_used(&self, id: i64, at: DateTime<Utc>) -> Result<bool, AppError> {
        match self.state().tickets.get_mut(&id) {
            Some(ticket) if ticket.status == TicketStatus::Valid => {
                ticket.status = TicketStatus::Used;
                ticket.used_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ReviewRepository for InMemoryDb {
    async fn find_by_id(&self, id: i64) -> Result<Option<Review>, AppError> {
        let state = self.state();
        Ok(state.reviews.get(&id).map(|r| state.with_author(r)))
    }

    async fn list_by_movie(&self, movie_id: i64, page: PageParams) -> Result<(Vec<Review>, i64), AppError> {
        let state = self.state();
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.movie_id == movie_id)
            .map(|r| state.with_author(r))
            .collect();
        reviews.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(reviews, page))
    }

    async fn create(&self, review: &Review) -> Result<Review, AppError> {
        let mut state = self.state();
        if state
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.movie_id == review.movie_id)
        {
            return Err(conflict("Review"));
        }
        state.reviews.insert(review.id, review.clone());
        Ok(state.with_author(review))
    }

    async fn update(&self, review: &Review) -> Result<Review, AppError> {
        let mut state = self.state();
        state.reviews.insert(review.id, review.clone());
        Ok(state.with_author(review))
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.state().reviews.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ReportRepository for InMemoryDb {
    async fn sales_report(&self, since: DateTime<Utc>, now: DateTime<Utc>, top: i64) -> Result<SalesReport, AppError> {
        let state = self.state();
        let in_window = |at: DateTime<Utc>| at >= since && at <= now;

        let paid: Vec<&Payment> = state
            .payments
            .values()
            .filter(|p| p.paid_at.is_some_and(in_window))
            .collect();
        let gross_revenue = paid.iter().map(|p| p.amount.amount).sum();
        let refunded = state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Refunded && p.refunded_at.is_some_and(in_window))
            .map(|p| p.amount.amount)
            .sum();

        let mut by_status: BTreeMap<String, i64> = BTreeMap::new();
        for booking in state.bookings.values().filter(|b| in_window(b.created_at)) {
            *by_status.entry(booking.status.as_str().to_string()).or_default() += 1;
        }

        let mut by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for payment in &paid {
            if let Some(at) = payment.paid_at {
                *by_day.entry(at.date_naive()).or_default() += payment.amount.amount;
            }
        }

        let sold: Vec<&Ticket> = state
            .tickets
            .values()
            .filter(|t| t.status != TicketStatus::Cancelled && in_window(t.issued_at))
            .collect();
        let mut per_movie: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
        for ticket in &sold {
            let Some(movie_id) = state.showtimes.get(&ticket.showtime_id).map(|s| s.movie_id) else {
                continue;
            };
            let price = state
                .bookings
                .get(&ticket.booking_id)
                .and_then(|b| b.seats.iter().find(|s| s.seat_id == ticket.seat_id))
                .map_or(0, |s| s.price);
            let entry = per_movie.entry(movie_id).or_default();
            entry.0 += 1;
            entry.1 += price;
        }
        let mut top_movies: Vec<MovieSales> = per_movie
            .into_iter()
            .map(|(movie_id, (tickets_sold, revenue))| MovieSales {
                movie_id,
                title: state.movies.get(&movie_id).map(|m| m.title.clone()).unwrap_or_default(),
                tickets_sold,
                revenue,
            })
            .collect();
        top_movies.sort_by(|a, b| {
            (b.tickets_sold, b.revenue, a.movie_id).cmp(&(a.tickets_sold, a.revenue, b.movie_id))
        });
        top_movies.truncate(top as usize);

        Ok(SalesReport {
            gross_revenue,
            refunded,
            bookings_by_status: by_status.into_iter().collect(),
            tickets_sold: sold.len() as i64,
            active_movies: state
                .movies
                .values()
                .filter(|m| m.status == MovieStatus::NowShowing)
                .count() as i64,
            upcoming_showtimes: state
                .showtimes
                .values()
                .filter(|s| s.is_scheduled() && s.starts_at > now)
                .count() as i64,
            revenue_by_day: by_day
                .into_iter()
                .map(|(day, amount)| DailyRevenue { day, amount })
                .collect(),
            top_movies,
        })
    }
}

// ---- Unit of work -------------------------------------------------------

#[async_trait]
impl UnitOfWork for InMemoryDb {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, AppError> {
        let draft = self.state().clone();
        Ok(Box::new(MemoryScope {
            db: self.clone(),
            draft,
        }))
    }
}

/// A transaction over a private copy of the store.
struct MemoryScope {
    db: InMemoryDb,
    draft: State,
}

#[async_trait]
impl TransactionScope for MemoryScope {
    async fn lock_showtime(&mut self, id: i64) -> Result<Option<Showtime>, AppError> {
        Ok(self.draft.showtimes.get(&id).cloned())
    }

    async fn set_showtime_status(&mut self, id: i64, status: ShowtimeStatus) -> Result<(), AppError> {
        let showtime = self.draft.showtimes.get_mut(&id).ok_or_else(|| missing("Showtime", id))?;
        showtime.status = status;
        showtime.updated_at = Utc::now();
        Ok(())
    }

    async fn lock_hall(&mut self, id: i64) -> Result<Option<Hall>, AppError> {
        Ok(self.draft.halls.get(&id).cloned())
    }

    async fn find_overlapping_showtimes(
        &mut self,
        hall_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Showtime>, AppError> {
        Ok(self
            .draft
            .showtimes
            .values()
            .filter(|s| {
                s.hall_id == hall_id
                    && s.status != ShowtimeStatus::Cancelled
                    && s.starts_at < to
                    && s.ends_at > from
            })
            .cloned()
            .collect())
    }

    async fn insert_showtime(&mut self, showtime: &Showtime) -> Result<Showtime, AppError> {
        self.draft.showtimes.insert(showtime.id, showtime.clone());
        Ok(showtime.clone())
    }

    async fn expire_stale_holds(&mut self, showtime_id: Option<i64>, now: DateTime<Utc>) -> Result<Vec<i64>, AppError> {
        let expired: Vec<i64> = self
            .draft
            .bookings
            .values()
            .filter(|b| b.is_hold_lapsed(now))
            .filter(|b| showtime_id.is_none_or(|id| b.showtime_id == id))
            .map(|b| b.id)
            .collect();
        for id in &expired {
            self.draft.set_booking_status(*id, BookingStatus::Expired, now);
        }
        self.release_seats(&expired).await?;
        Ok(expired)
    }

    async fn pending_bookings_for_showtime(&mut self, showtime_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .draft
            .bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && b.status == BookingStatus::Pending)
            .map(|b| b.id)
            .collect())
    }

    async fn count_confirmed_bookings(&mut self, showtime_id: i64) -> Result<i64, AppError> {
        Ok(self
            .draft
            .bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && b.status == BookingStatus::Confirmed)
            .count() as i64)
    }

    async fn find_taken_seats(&mut self, showtime_id: i64, seat_ids: &[i64]) -> Result<Vec<i64>, AppError> {
        Ok(self.draft.taken_seats(showtime_id, seat_ids))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), AppError> {
        if !self
            .draft
            .taken_seats(booking.showtime_id, &booking.seat_ids())
            .is_empty()
        {
            return Err(AppError::Conflict("Seat already taken".into()));
        }
        self.draft.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn lock_booking(&mut self, id: i64) -> Result<Option<Booking>, AppError> {
        Ok(self.draft.bookings.get(&id).cloned())
    }

    async fn set_booking_status(&mut self, booking_id: i64, status: BookingStatus, at: DateTime<Utc>) -> Result<(), AppError> {
        self.draft.set_booking_status(booking_id, status, at);
        Ok(())
    }

    async fn release_seats(&mut self, booking_ids: &[i64]) -> Result<(), AppError> {
        self.draft.released.extend(booking_ids.iter().copied());
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        self.draft.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn cancel_pending_payments(&mut self, booking_ids: &[i64], at: DateTime<Utc>) -> Result<Vec<Payment>, AppError> {
        let mut cancelled = Vec::new();
        for payment in self.draft.payments.values_mut() {
            if booking_ids.contains(&payment.booking_id) && payment.status == PaymentStatus::Pending {
                payment.status = PaymentStatus::Cancelled;
                payment.updated_at = at;
                cancelled.push(payment.clone());
            }
        }
        Ok(cancelled)
    }

    async fn insert_tickets(&mut self, tickets: &[Ticket]) -> Result<(), AppError> {
        for ticket in tickets {
            self.draft.tickets.insert(ticket.id, ticket.clone());
        }
        Ok(())
    }

    async fn set_ticket_statuses(&mut self, booking_id: i64, status: TicketStatus) -> Result<(), AppError> {
        for ticket in self.draft.tickets.values_mut() {
            if ticket.booking_id == booking_id {
                ticket.status = status;
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        *self.db.state() = std::mem::take(&mut self.draft);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

// ---- Cache --------------------------------------------------------------

/// Cache backed by a plain map, ignoring expiry.
#[derive(Debug, Default)]
pub(crate) struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub(crate) fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String, _seconds: u64) -> Result<(), AppError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().unwrap();
        Ok(keys.iter().filter(|&&k| entries.remove(k).is_some()).count() as u64)
    }
}

// ---- Settings & samples -------------------------------------------------

pub(crate) fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "test-secret-key-that-is-long-enough-0001".into(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 30,
    }
}

pub(crate) fn booking_settings() -> BookingSettings {
    BookingSettings {
        hold_minutes: 10,
        max_seats_per_booking: 10,
        sales_cutoff_minutes: 10,
        cancellation_cutoff_hours: 2,
        cleaning_buffer_minutes: 15,
        expiry_sweep_seconds: 60,
        currency: "usd".into(),
    }
}

/// A confirmed one-seat booking (B4, VIP) with its customer and screening.
pub(crate) fn sample_context() -> BookingContext {
    let now = Utc::now();
    BookingContext {
        booking: Booking {
            id: 100,
            booking_code: "ABCD2345".into(),
            user_id: 7,
            showtime_id: 300,
            status: BookingStatus::Confirmed,
            total: Money::new(2500, "usd"),
            seats: vec![BookingSeat {
                seat_id: 400,
                row_label: "B".into(),
                number: 4,
                seat_type: SeatType::Vip,
                price: 2500,
            }],
            idempotency_key: None,
            expires_at: now + Duration::minutes(10),
            confirmed_at: Some(now),
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        },
        user_email: "jane@example.com".into(),
        user_name: "Jane Doe".into(),
        movie_id: 200,
        movie_title: "Arrival".into(),
        hall_name: "Hall 1".into(),
        branch_name: "Downtown".into(),
        starts_at: now + Duration::days(1),
    }
}

pub(crate) fn sample_ticket(booking: &Booking, code: &str) -> Ticket {
    Ticket {
        id: booking.id + 1,
        ticket_code: code.to_string(),
        booking_id: booking.id,
        showtime_id: booking.showtime_id,
        seat_id: booking.seats[0].seat_id,
        user_id: booking.user_id,
        status: TicketStatus::Valid,
        issued_at: booking.created_at,
        used_at: None,
    }
}

// ---- Fixture ------------------------------------------------------------

fn fixture_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(Fixture::PASSWORD).unwrap())
        .clone()
}

/// A seeded store: one customer, one admin, and a branch with a 3x4 hall
/// (row B is VIP) screening one movie tomorrow at 10.00 USD.
pub(crate) struct Fixture {
    pub db: InMemoryDb,
    pub customer: User,
    pub admin: User,
    pub branch: Branch,
    pub hall: Hall,
    /// Ordered by row then number, so `seats[0]` is A1
    pub seats: Vec<Seat>,
    pub genre: Genre,
    pub movie: Movie,
    pub showtime: Showtime,
    ids: SnowflakeGenerator,
}

impl Fixture {
    pub const PASSWORD: &'static str = "fixture password";

    pub fn new() -> Self {
        let ids = SnowflakeGenerator::new(1, 31);
        let now = Utc::now();

        let user = |email: &str, name: &str, role: UserRole| User {
            id: ids.generate(),
            email: email.into(),
            password_hash: fixture_password_hash(),
            full_name: name.into(),
            phone: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let customer = user("customer@example.com", "Casey Customer", UserRole::Customer);
        let admin = user("admin@example.com", "Ada Admin", UserRole::Admin);

        let branch = Branch {
            id: ids.generate(),
            name: "Downtown".into(),
            address: "1 Main Street".into(),
            city: "Springfield".into(),
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let hall = Hall {
            id: ids.generate(),
            branch_id: branch.id,
            name: "Hall 1".into(),
            hall_type: HallType::Standard,
            rows: 3,
            seats_per_row: 4,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let seats = generate_seat_grid(hall.id, 3, 4, &["B".to_string()], &[], || ids.generate())
            .unwrap();

        let genre = Genre {
            id: ids.generate(),
            name: "Drama".into(),
        };
        let movie = Movie {
            id: ids.generate(),
            title: "The Long Night".into(),
            description: "A quiet drama".into(),
            duration_minutes: 120,
            release_date: now.date_naive(),
            age_rating: AgeRating::Pg13,
            language: "English".into(),
            poster_url: None,
            trailer_url: None,
            status: MovieStatus::NowShowing,
            genre_ids: vec![genre.id],
            created_at: now,
            updated_at: now,
        };
        let starts_at = now + Duration::days(1);
        let showtime = Showtime {
            id: ids.generate(),
            movie_id: movie.id,
            hall_id: hall.id,
            starts_at,
            ends_at: starts_at + Duration::minutes(movie.duration_minutes as i64),
            base_price: Money::new(1000, "usd"),
            status: ShowtimeStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        let db = InMemoryDb::default();
        {
            let mut state = db.state();
            state.users.insert(customer.id, customer.clone());
            state.users.insert(admin.id, admin.clone());
            state.branches.insert(branch.id, branch.clone());
            state.halls.insert(hall.id, hall.clone());
            for seat in &seats {
                state.seats.insert(seat.id, seat.clone());
            }
            state.genres.insert(genre.id, genre.clone());
            state.movies.insert(movie.id, movie.clone());
            state.showtimes.insert(showtime.id, showtime.clone());
        }

        Self {
            db,
            customer,
            admin,
            branch,
            hall,
            seats,
            genre,
            movie,
            showtime,
            ids,
        }
    }

    pub fn customer_actor(&self) -> Actor {
        Actor::new(self.customer.id, UserRole::Customer)
    }

    pub fn admin_actor(&self) -> Actor {
        Actor::new(self.admin.id, UserRole::Admin)
    }

    /// Store a pending ten-minute hold by the customer on the given seats.
    pub async fn hold_booking(&self, seat_ids: &[i64]) -> Booking {
        let now = Utc::now();
        let seats: Vec<Seat> = self
            .seats
            .iter()
            .filter(|s| seat_ids.contains(&s.id))
            .cloned()
            .collect();
        let (seats, total) = pricing::price_seats(&self.showtime.base_price, &seats).unwrap();
        let booking = Booking {
            id: self.ids.generate(),
            booking_code: codes::booking_code(),
            user_id: self.customer.id,
            showtime_id: self.showtime.id,
            status: BookingStatus::Pending,
            total,
            seats,
            idempotency_key: None,
            expires_at: now + Duration::minutes(10),
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        self.db.state().bookings.insert(booking.id, booking.clone());
        booking
    }

    /// Store a booking paid through `gateway`, with one valid ticket per seat.
    pub async fn confirmed_booking(&self, gateway: &dyn PaymentGateway, seat_ids: &[i64]) -> (Booking, Payment) {
        let mut booking = self.hold_booking(seat_ids).await;
        let now = Utc::now();

        let intent = gateway
            .create_intent(&booking.total, &BTreeMap::new(), &format!("fixture-{}", booking.id))
            .await
            .unwrap();
        // The mock settles an intent on its first retrieve
        gateway.retrieve_intent(&intent.id).await.unwrap();

        let payment = Payment {
            id: self.ids.generate(),
            booking_id: booking.id,
            user_id: booking.user_id,
            amount: booking.total.clone(),
            provider: gateway.provider().to_string(),
            provider_payment_id: intent.id,
            client_secret: intent.client_secret,
            status: PaymentStatus::Succeeded,
            failure_reason: None,
            refund_id: None,
            paid_at: Some(now),
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };
        booking.transition(BookingStatus::Confirmed, now).unwrap();

        let mut state = self.db.state();
        for seat in &booking.seats {
            let ticket = Ticket {
                id: self.ids.generate(),
                ticket_code: codes::ticket_code(),
                booking_id: booking.id,
                showtime_id: booking.showtime_id,
                seat_id: seat.seat_id,
                user_id: booking.user_id,
                status: TicketStatus::Valid,
                issued_at: now,
                used_at: None,
            };
            state.tickets.insert(ticket.id, ticket);
        }
        state.payments.insert(payment.id, payment.clone());
        state.bookings.insert(booking.id, booking.clone());
        (booking, payment)
    }
}
