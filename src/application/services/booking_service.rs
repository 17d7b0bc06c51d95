//! Booking Service
//!
//! Seat holds and their lifecycle. Creating a hold is the contended path:
//! it runs in one transaction with the showtime row locked, so two
//! customers racing for the same seat are serialised and the loser sees
//! `SeatsUnavailable`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use super::email_service::EmailService;
use super::{settlement, Actor};
use crate::application::dto::request::{BookingListQuery, CreateBookingRequest, Paged};
use crate::application::dto::response::BookingResponse;
use crate::config::BookingSettings;
use crate::domain::services::{pricing, scheduling, IntentStatus, PaymentGateway};
use crate::domain::{
    Booking, BookingFilter, BookingRepository, BookingStatus, HallRepository, Payment,
    PaymentRepository, PaymentStatus, ShowtimeRepository, UnitOfWork,
};
use crate::infrastructure::metrics;
use crate::shared::codes;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_id, parse_optional_id};

/// Result of `create_booking`; `replayed` is set when an earlier booking
/// with the same idempotency key was returned.
#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: BookingResponse,
    pub replayed: bool,
}

#[async_trait]
pub trait BookingService: Send + Sync {
    async fn create_booking(
        &self,
        actor: Actor,
        request: CreateBookingRequest,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CreatedBooking, BookingError>;

    async fn get(&self, actor: Actor, id: i64) -> Result<BookingResponse, BookingError>;

    async fn list_mine(
        &self,
        actor: Actor,
        query: BookingListQuery,
    ) -> Result<Page<BookingResponse>, BookingError>;

    async fn admin_list(&self, query: BookingListQuery) -> Result<Page<BookingResponse>, BookingError>;

    async fn cancel(&self, actor: Actor, id: i64, now: DateTime<Utc>) -> Result<BookingResponse, BookingError>;

    /// Expire every lapsed hold. Returns how many bookings expired.
    async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<usize, BookingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("Showtime not found")]
    ShowtimeNotFound,

    #[error("You do not have access to this booking")]
    Forbidden,

    #[error("Select between 1 and {0} seats")]
    InvalidSeatCount(usize),

    #[error("Each seat may only be selected once")]
    DuplicateSeats,

    #[error("Seats do not belong to this showtime's hall")]
    UnknownSeats,

    #[error("Seats unavailable: {}", .0.join(", "))]
    SeatsUnavailable(Vec<String>),

    #[error("Showtime is not open for booking")]
    ShowtimeNotScheduled,

    #[error("Ticket sales for this showtime have closed")]
    SalesClosed,

    #[error("Cancellation window has closed")]
    CancellationClosed,

    #[error("Booking is {0} and cannot be cancelled")]
    NotCancellable(BookingStatus),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound | BookingError::ShowtimeNotFound => {
                AppError::NotFound(err.to_string())
            }
            BookingError::Forbidden => AppError::Forbidden(err.to_string()),
            BookingError::InvalidSeatCount(_)
            | BookingError::DuplicateSeats
            | BookingError::UnknownSeats => AppError::BadRequest(err.to_string()),
            BookingError::SeatsUnavailable(_)
            | BookingError::ShowtimeNotScheduled
            | BookingError::SalesClosed
            | BookingError::CancellationClosed
            | BookingError::NotCancellable(_) => AppError::Conflict(err.to_string()),
            BookingError::Repository(e) => e,
        }
    }
}

pub struct BookingServiceImpl<S, H, B, P>
where
    S: ShowtimeRepository,
    H: HallRepository,
    B: BookingRepository,
    P: PaymentRepository,
{
    showtime_repo: Arc<S>,
    hall_repo: Arc<H>,
    booking_repo: Arc<B>,
    payment_repo: Arc<P>,
    uow: Arc<dyn UnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    email: EmailService,
    settings: BookingSettings,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<S, H, B, P> BookingServiceImpl<S, H, B, P>
where
    S: ShowtimeRepository,
    H: HallRepository,
    B: BookingRepository,
    P: PaymentRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        showtime_repo: Arc<S>,
        hall_repo: Arc<H>,
        booking_repo: Arc<B>,
        payment_repo: Arc<P>,
        uow: Arc<dyn UnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        email: EmailService,
        settings: BookingSettings,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            showtime_repo,
            hall_repo,
            booking_repo,
            payment_repo,
            uow,
            gateway,
            email,
            settings,
            id_generator,
        }
    }

    async fn load_for(&self, actor: Actor, id: i64) -> Result<Booking, BookingError> {
        let booking = self
            .booking_repo
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound)?;
        if !actor.can_access(booking.user_id) {
            return Err(BookingError::Forbidden);
        }
        Ok(booking)
    }

    fn parse_seat_ids(&self, raw: &[String]) -> Result<Vec<i64>, BookingError> {
        let max = self.settings.max_seats_per_booking;
        if raw.is_empty() || raw.len() > max {
            return Err(BookingError::InvalidSeatCount(max));
        }
        let ids = raw
            .iter()
            .map(|id| parse_id(id, "seat"))
            .collect::<Result<Vec<_>, _>>()?;
        let distinct: HashSet<i64> = ids.iter().copied().collect();
        if distinct.len() != ids.len() {
            return Err(BookingError::DuplicateSeats);
        }
        Ok(ids)
    }

    /// Cancel provider intents of payments the database already cancelled.
    ///
    /// An intent the customer managed to pay before the hold lapsed can no
    /// longer be cancelled; it is refunded instead.
    async fn cancel_intents(&self, payments: &[Payment], now: DateTime<Utc>) {
        for payment in payments {
            let Err(e) = self.gateway.cancel_intent(&payment.provider_payment_id).await else {
                continue;
            };

            match self.gateway.retrieve_intent(&payment.provider_payment_id).await {
                Ok(intent) if intent.status == IntentStatus::Succeeded => {
                    self.refund_captured(payment.clone(), now).await
                }
                _ => warn!(
                    payment_id = payment.id,
                    intent_id = %payment.provider_payment_id,
                    error = %e,
                    "Failed to cancel payment intent"
                ),
            }
        }
    }

    async fn refund_captured(&self, mut payment: Payment, now: DateTime<Utc>) {
        warn!(
            payment_id = payment.id,
            booking_id = payment.booking_id,
            "Payment captured after its hold ended, refunding"
        );
        if let Err(e) = settlement::refund_intent(self.gateway.as_ref(), &mut payment, now).await {
            // A later confirm or webhook retries with the same refund key
            warn!(payment_id = payment.id, error = %e, "Failed to refund captured payment");
            return;
        }
        if let Err(e) = self.payment_repo.save(&payment).await {
            warn!(payment_id = payment.id, error = %e, "Failed to record refund");
        }
    }

    async fn cancel_pending(&self, booking: Booking, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let mut tx = self.uow.begin().await?;
        let mut locked = tx
            .lock_booking(booking.id)
            .await?
            .ok_or(BookingError::NotFound)?;
        if locked.status != BookingStatus::Pending {
            // Confirmed or expired while we waited for the lock
            return Err(BookingError::NotCancellable(locked.status));
        }

        locked.transition(BookingStatus::Cancelled, now)?;
        tx.set_booking_status(locked.id, BookingStatus::Cancelled, now)
            .await?;
        tx.release_seats(&[locked.id]).await?;
        let payments = tx.cancel_pending_payments(&[locked.id], now).await?;
        tx.commit().await?;

        self.cancel_intents(&payments, now).await;
        Ok(locked)
    }

    async fn cancel_confirmed(&self, booking: Booking, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let showtime = self
            .showtime_repo
            .find_by_id(booking.showtime_id)
            .await?
            .ok_or(BookingError::ShowtimeNotFound)?;
        if !scheduling::cancellation_open(
            showtime.starts_at,
            now,
            self.settings.cancellation_cutoff_hours,
        ) {
            return Err(BookingError::CancellationClosed);
        }

        let payment = self
            .payment_repo
            .list_for_booking(booking.id)
            .await?
            .into_iter()
            .find(|p| p.status == PaymentStatus::Succeeded)
            .ok_or_else(|| {
                AppError::Internal(format!("Confirmed booking {} has no settled payment", booking.id))
            })?;

        let (cancelled, payment) =
            settlement::refund_and_cancel(self.uow.as_ref(), self.gateway.as_ref(), payment, now)
                .await?;

        match self.booking_repo.find_context(cancelled.id).await {
            Ok(Some(context)) => {
                self.email
                    .send_booking_cancellation(&context, Some(&payment.amount))
                    .await
            }
            Ok(None) => {}
            Err(e) => warn!(booking_id = cancelled.id, error = %e, "Failed to load booking for email"),
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl<S, H, B, P> BookingService for BookingServiceImpl<S, H, B, P>
where
    S: ShowtimeRepository + 'static,
    H: HallRepository + 'static,
    B: BookingRepository + 'static,
    P: PaymentRepository + 'static,
{
    #[instrument(skip(self, request, idempotency_key), fields(user_id = actor.user_id))]
    async fn create_booking(
        &self,
        actor: Actor,
        request: CreateBookingRequest,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CreatedBooking, BookingError> {
        let showtime_id = parse_id(&request.showtime_id, "showtime")?;
        let seat_ids = self.parse_seat_ids(&request.seat_ids)?;

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self
                .booking_repo
                .find_by_idempotency_key(actor.user_id, key)
                .await?
            {
                info!(booking_id = existing.id, "Booking request replayed");
                return Ok(CreatedBooking {
                    booking: existing.into(),
                    replayed: true,
                });
            }
        }

        let mut tx = self.uow.begin().await?;

        let showtime = tx
            .lock_showtime(showtime_id)
            .await?
            .ok_or(BookingError::ShowtimeNotFound)?;
        if !showtime.is_scheduled() {
            return Err(BookingError::ShowtimeNotScheduled);
        }
        if !scheduling::sales_open(showtime.starts_at, now, self.settings.sales_cutoff_minutes) {
            metrics::record_booking("sales_closed");
            return Err(BookingError::SalesClosed);
        }

        let expired = settlement::expire_holds(tx.as_mut(), Some(showtime_id), now).await?;

        let mut seats = self.hall_repo.find_seats(showtime.hall_id, &seat_ids).await?;
        if seats.len() != seat_ids.len() {
            return Err(BookingError::UnknownSeats);
        }
        seats.sort_by(|a, b| (&a.row_label, a.number).cmp(&(&b.row_label, b.number)));

        let inactive: Vec<String> = seats.iter().filter(|s| !s.is_active).map(|s| s.label()).collect();
        if !inactive.is_empty() {
            return Err(BookingError::SeatsUnavailable(inactive));
        }

        let taken = tx.find_taken_seats(showtime_id, &seat_ids).await?;
        if !taken.is_empty() {
            let labels = seats
                .iter()
                .filter(|s| taken.contains(&s.id))
                .map(|s| s.label())
                .collect();
            metrics::record_booking("seats_unavailable");
            return Err(BookingError::SeatsUnavailable(labels));
        }

        let (priced, total) = pricing::price_seats(&showtime.base_price, &seats)?;
        let booking = Booking {
            id: self.id_generator.generate(),
            booking_code: codes::booking_code(),
            user_id: actor.user_id,
            showtime_id,
            status: BookingStatus::Pending,
            total,
            seats: priced,
            idempotency_key,
            expires_at: now + Duration::minutes(self.settings.hold_minutes),
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        match tx.insert_booking(&booking).await {
            Ok(()) => {}
            Err(AppError::Conflict(_)) => {
                metrics::record_booking("seats_unavailable");
                return Err(BookingError::SeatsUnavailable(booking.seat_labels()));
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        if !expired.booking_ids.is_empty() {
            metrics::record_holds_expired(expired.booking_ids.len());
            self.cancel_intents(&expired.payments, now).await;
        }
        metrics::record_booking("created");
        info!(
            booking_id = booking.id,
            booking_code = %booking.booking_code,
            showtime_id,
            seats = booking.seats.len(),
            total = booking.total.amount,
            "Seats held"
        );

        Ok(CreatedBooking {
            booking: booking.into(),
            replayed: false,
        })
    }

    async fn get(&self, actor: Actor, id: i64) -> Result<BookingResponse, BookingError> {
        Ok(self.load_for(actor, id).await?.into())
    }

    async fn list_mine(
        &self,
        actor: Actor,
        query: BookingListQuery,
    ) -> Result<Page<BookingResponse>, BookingError> {
        let page = query.page_params();
        let filter = BookingFilter {
            user_id: Some(actor.user_id),
            showtime_id: None,
            status: query.status,
        };
        let (bookings, total) = self.booking_repo.list(&filter, page).await?;
        Ok(Page::new(bookings, page, total).map(BookingResponse::from))
    }

    async fn admin_list(&self, query: BookingListQuery) -> Result<Page<BookingResponse>, BookingError> {
        let page = query.page_params();
        let filter = BookingFilter {
            user_id: parse_optional_id(query.user_id.as_deref(), "user")?,
            showtime_id: parse_optional_id(query.showtime_id.as_deref(), "showtime")?,
            status: query.status,
        };
        let (bookings, total) = self.booking_repo.list(&filter, page).await?;
        Ok(Page::new(bookings, page, total).map(BookingResponse::from))
    }

    #[instrument(skip(self), fields(user_id = actor.user_id))]
    async fn cancel(&self, actor: Actor, id: i64, now: DateTime<Utc>) -> Result<BookingResponse, BookingError> {
        let booking = self.load_for(actor, id).await?;

        let cancelled = match booking.status {
            BookingStatus::Pending => self.cancel_pending(booking, now).await?,
            BookingStatus::Confirmed => self.cancel_confirmed(booking, now).await?,
            status => return Err(BookingError::NotCancellable(status)),
        };

        info!(booking_id = id, "Booking cancelled");
        Ok(cancelled.into())
    }

    async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<usize, BookingError> {
        let mut tx = self.uow.begin().await?;
        let expired = settlement::expire_holds(tx.as_mut(), None, now).await?;
        if expired.booking_ids.is_empty() {
            tx.rollback().await?;
            return Ok(0);
        }
        tx.commit().await?;

        self.cancel_intents(&expired.payments, now).await;
        metrics::record_holds_expired(expired.booking_ids.len());

        info!(
            bookings = expired.booking_ids.len(),
            payments = expired.payments.len(),
            "Stale holds expired"
        );
        Ok(expired.booking_ids.len())
    }
}
