//! Showtime Service
//!
//! Scheduling, listing and seat maps. Scheduling locks the hall row for
//! the overlap check and insert. Cancelling a showtime runs in one
//! transaction with the showtime row locked, so no booking can slip in
//! while its pending holds are being cancelled.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::application::dto::request::{CreateShowtimeRequest, ShowtimeListQuery};
use crate::application::dto::response::{SeatMapEntry, SeatMapResponse, ShowtimeResponse};
use crate::config::BookingSettings;
use crate::domain::services::{pricing, scheduling, PaymentGateway};
use crate::domain::{
    seat_availability, BookingStatus, HallRepository, Money, MovieRepository, MovieStatus,
    Showtime, ShowtimeFilter, ShowtimeRepository, ShowtimeStatus, UnitOfWork,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_id, parse_optional_id, validate};

#[async_trait]
pub trait ShowtimeService: Send + Sync {
    async fn list(&self, query: ShowtimeListQuery) -> Result<Vec<ShowtimeResponse>, ShowtimeError>;

    async fn get(&self, id: i64) -> Result<ShowtimeResponse, ShowtimeError>;

    /// Every seat of the hall with its price and availability
    async fn seat_map(&self, id: i64, now: DateTime<Utc>) -> Result<SeatMapResponse, ShowtimeError>;

    async fn create(
        &self,
        request: CreateShowtimeRequest,
        now: DateTime<Utc>,
    ) -> Result<ShowtimeResponse, ShowtimeError>;

    /// Cancel a showtime with no confirmed bookings, dropping its pending holds
    async fn cancel(&self, id: i64, now: DateTime<Utc>) -> Result<ShowtimeResponse, ShowtimeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ShowtimeError {
    #[error("Showtime not found")]
    NotFound,

    #[error("Movie not found")]
    MovieNotFound,

    #[error("Hall not found")]
    HallNotFound,

    #[error("Movie has ended its run")]
    MovieEnded,

    #[error("Hall is not active")]
    HallInactive,

    #[error("Showtime must start in the future")]
    StartInPast,

    #[error("Hall is already booked from {0} to {1}")]
    Overlap(DateTime<Utc>, DateTime<Utc>),

    #[error("Showtime is {0}")]
    NotScheduled(&'static str),

    #[error("Showtime has {0} confirmed bookings")]
    HasConfirmedBookings(i64),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ShowtimeError> for AppError {
    fn from(err: ShowtimeError) -> Self {
        match err {
            ShowtimeError::NotFound | ShowtimeError::MovieNotFound | ShowtimeError::HallNotFound => {
                AppError::NotFound(err.to_string())
            }
            ShowtimeError::MovieEnded | ShowtimeError::HallInactive | ShowtimeError::StartInPast => {
                AppError::BadRequest(err.to_string())
            }
            ShowtimeError::Overlap(..)
            | ShowtimeError::NotScheduled(_)
            | ShowtimeError::HasConfirmedBookings(_) => AppError::Conflict(err.to_string()),
            ShowtimeError::Repository(e) => e,
        }
    }
}

pub struct ShowtimeServiceImpl<S, M, H>
where
    S: ShowtimeRepository,
    M: MovieRepository,
    H: HallRepository,
{
    showtime_repo: Arc<S>,
    movie_repo: Arc<M>,
    hall_repo: Arc<H>,
    uow: Arc<dyn UnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    settings: BookingSettings,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<S, M, H> ShowtimeServiceImpl<S, M, H>
where
    S: ShowtimeRepository,
    M: MovieRepository,
    H: HallRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        showtime_repo: Arc<S>,
        movie_repo: Arc<M>,
        hall_repo: Arc<H>,
        uow: Arc<dyn UnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        settings: BookingSettings,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            showtime_repo,
            movie_repo,
            hall_repo,
            uow,
            gateway,
            settings,
            id_generator,
        }
    }

    async fn load(&self, id: i64) -> Result<Showtime, ShowtimeError> {
        self.showtime_repo.find_by_id(id).await?.ok_or(ShowtimeError::NotFound)
    }
}

#[async_trait]
impl<S, M, H> ShowtimeService for ShowtimeServiceImpl<S, M, H>
where
    S: ShowtimeRepository + 'static,
    M: MovieRepository + 'static,
    H: HallRepository + 'static,
{
    async fn list(&self, query: ShowtimeListQuery) -> Result<Vec<ShowtimeResponse>, ShowtimeError> {
        let filter = ShowtimeFilter {
            movie_id: parse_optional_id(query.movie_id.as_deref(), "movie")?,
            hall_id: parse_optional_id(query.hall_id.as_deref(), "hall")?,
            branch_id: parse_optional_id(query.branch_id.as_deref(), "branch")?,
            date: query.date,
            upcoming_after: query.upcoming.then(Utc::now),
        };
        let showtimes = self.showtime_repo.list(&filter).await?;
        Ok(showtimes.into_iter().map(ShowtimeResponse::from).collect())
    }

    async fn get(&self, id: i64) -> Result<ShowtimeResponse, ShowtimeError> {
        Ok(self.load(id).await?.into())
    }

    async fn seat_map(&self, id: i64, now: DateTime<Utc>) -> Result<SeatMapResponse, ShowtimeError> {
        let showtime = self.load(id).await?;
        let hall = self
            .hall_repo
            .find_by_id(showtime.hall_id)
            .await?
            .ok_or(ShowtimeError::HallNotFound)?;
        let seats = self.hall_repo.seats(hall.id).await?;
        let claims = self.showtime_repo.seat_claims(id).await?;

        let entries = seats
            .iter()
            .map(|seat| {
                Ok(SeatMapEntry {
                    seat_id: seat.id.to_string(),
                    row_label: seat.row_label.clone(),
                    number: seat.number,
                    seat_type: seat.seat_type,
                    price: pricing::seat_price(&showtime.base_price, seat.seat_type)?.amount,
                    availability: seat_availability(seat, &claims, now),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(SeatMapResponse {
            currency: showtime.base_price.currency.clone(),
            rows: hall.rows,
            seats_per_row: hall.seats_per_row,
            showtime: showtime.into(),
            seats: entries,
        })
    }

    async fn create(
        &self,
        request: CreateShowtimeRequest,
        now: DateTime<Utc>,
    ) -> Result<ShowtimeResponse, ShowtimeError> {
        validate(&request)?;
        let movie_id = parse_id(&request.movie_id, "movie")?;
        let hall_id = parse_id(&request.hall_id, "hall")?;

        let movie = self
            .movie_repo
            .find_by_id(movie_id)
            .await?
            .ok_or(ShowtimeError::MovieNotFound)?;
        if movie.status == MovieStatus::Ended {
            return Err(ShowtimeError::MovieEnded);
        }
        if request.starts_at <= now {
            return Err(ShowtimeError::StartInPast);
        }

        // Schedulers of the same hall queue on the hall row until commit
        let mut tx = self.uow.begin().await?;
        let hall = tx.lock_hall(hall_id).await?.ok_or(ShowtimeError::HallNotFound)?;
        if !hall.is_active {
            return Err(ShowtimeError::HallInactive);
        }

        let ends_at = scheduling::screening_end(request.starts_at, movie.duration_minutes);
        let (from, to) = scheduling::blocked_window(
            request.starts_at,
            ends_at,
            self.settings.cleaning_buffer_minutes,
        );
        if let Some(clash) = tx
            .find_overlapping_showtimes(hall_id, from, to)
            .await?
            .into_iter()
            .next()
        {
            return Err(ShowtimeError::Overlap(clash.starts_at, clash.ends_at));
        }

        let currency = request
            .currency
            .unwrap_or_else(|| self.settings.currency.clone());
        let showtime = Showtime {
            id: self.id_generator.generate(),
            movie_id,
            hall_id,
            starts_at: request.starts_at,
            ends_at,
            base_price: Money::new(request.base_price, currency),
            status: ShowtimeStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        let created = tx.insert_showtime(&showtime).await?;
        tx.commit().await?;
        info!(
            showtime_id = created.id,
            movie_id,
            hall_id,
            starts_at = %created.starts_at,
            "Showtime scheduled"
        );
        Ok(created.into())
    }

    async fn cancel(&self, id: i64, now: DateTime<Utc>) -> Result<ShowtimeResponse, ShowtimeError> {
        let mut tx = self.uow.begin().await?;

        let mut showtime = tx.lock_showtime(id).await?.ok_or(ShowtimeError::NotFound)?;
        if !showtime.is_scheduled() {
            return Err(ShowtimeError::NotScheduled(showtime.status.as_str()));
        }

        let confirmed = tx.count_confirmed_bookings(id).await?;
        if confirmed > 0 {
            return Err(ShowtimeError::HasConfirmedBookings(confirmed));
        }

        let pending = tx.pending_bookings_for_showtime(id).await?;
        for booking_id in &pending {
            tx.set_booking_status(*booking_id, BookingStatus::Cancelled, now)
                .await?;
        }
        tx.release_seats(&pending).await?;
        let payments = tx.cancel_pending_payments(&pending, now).await?;
        tx.set_showtime_status(id, ShowtimeStatus::Cancelled).await?;
        tx.commit().await?;

        info!(showtime_id = id, holds_cancelled = pending.len(), "Showtime cancelled");

        for payment in payments {
            if let Err(e) = self.gateway.cancel_intent(&payment.provider_payment_id).await {
                warn!(
                    payment_id = payment.id,
                    intent_id = %payment.provider_payment_id,
                    error = %e,
                    "Failed to cancel payment intent"
                );
            }
        }

        showtime.status = ShowtimeStatus::Cancelled;
        showtime.updated_at = now;
        Ok(showtime.into())
    }
}
