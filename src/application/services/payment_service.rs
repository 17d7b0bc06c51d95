//! Payment Service
//!
//! Drives the paying half of the booking saga:
//!
//! ```text
//! create_intent --> (customer pays at the provider) --> confirm / webhook
//!                                                          |
//!                                                     finalize()
//!                                  lock booking, payment Succeeded,
//!                                  booking Confirmed, one ticket per seat
//! ```
//!
//! `confirm` and the `payment_intent.succeeded` webhook both end in
//! [`PaymentServiceImpl::finalize`], which is safe to run any number of
//! times for the same payment. A payment cancelled locally whose intent
//! was captured anyway also ends there and is refunded.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::email_service::EmailService;
use super::{settlement, Actor};
use crate::application::dto::request::{CreatePaymentRequest, Paged, PaymentListQuery};
use crate::application::dto::response::{
    PaymentConfirmationResponse, PaymentResponse, TicketResponse, WebhookAck,
};
use crate::domain::services::{GatewayError, IntentStatus, PaymentGateway, WebhookEventKind};
use crate::domain::{
    Booking, BookingRepository, BookingStatus, Payment, PaymentRepository, PaymentStatus, Ticket,
    TicketRepository, TicketStatus, UnitOfWork,
};
use crate::infrastructure::metrics;
use crate::shared::codes;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::parse_id;

#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Start paying for a pending booking
    async fn create_intent(
        &self,
        actor: Actor,
        request: CreatePaymentRequest,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentResponse, PaymentError>;

    /// Ask the provider how the payment went and settle it
    async fn confirm(
        &self,
        actor: Actor,
        payment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmationResponse, PaymentError>;

    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookAck, PaymentError>;

    async fn get(&self, actor: Actor, id: i64) -> Result<PaymentResponse, PaymentError>;

    async fn admin_list(&self, query: PaymentListQuery) -> Result<Page<PaymentResponse>, PaymentError>;

    /// Refund a succeeded payment and cancel its booking
    async fn admin_refund(&self, id: i64, now: DateTime<Utc>) -> Result<PaymentResponse, PaymentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment not found")]
    NotFound,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("You do not have access to this payment")]
    Forbidden,

    #[error("Booking is {0}, only pending bookings can be paid")]
    BookingNotPending(BookingStatus),

    #[error("Booking is already paid")]
    AlreadyPaid,

    #[error("Seat hold expired before payment completed; the payment has been refunded")]
    HoldExpired,

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment was cancelled")]
    IntentCanceled,

    #[error("Payment was refunded")]
    Refunded,

    #[error("Only succeeded payments can be refunded")]
    NotRefundable,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound | PaymentError::BookingNotFound => AppError::NotFound(err.to_string()),
            PaymentError::Forbidden => AppError::Forbidden(err.to_string()),
            PaymentError::BookingNotPending(_)
            | PaymentError::AlreadyPaid
            | PaymentError::IntentCanceled
            | PaymentError::Refunded
            | PaymentError::NotRefundable => AppError::Conflict(err.to_string()),
            PaymentError::HoldExpired => AppError::Gone(err.to_string()),
            PaymentError::Declined(reason) => AppError::PaymentRequired(reason),
            PaymentError::Gateway(e) => e.into(),
            PaymentError::Repository(e) => e,
        }
    }
}

/// What a successful finalisation produced.
struct Settled {
    payment: Payment,
    booking: Booking,
    tickets: Vec<Ticket>,
}

impl From<Settled> for PaymentConfirmationResponse {
    fn from(settled: Settled) -> Self {
        Self {
            payment: settled.payment.into(),
            booking: settled.booking.into(),
            tickets: settled.tickets.into_iter().map(TicketResponse::from).collect(),
        }
    }
}

pub struct PaymentServiceImpl<B, P, T>
where
    B: BookingRepository,
    P: PaymentRepository,
    T: TicketRepository,
{
    booking_repo: Arc<B>,
    payment_repo: Arc<P>,
    ticket_repo: Arc<T>,
    uow: Arc<dyn UnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    email: EmailService,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<B, P, T> PaymentServiceImpl<B, P, T>
where
    B: BookingRepository,
    P: PaymentRepository,
    T: TicketRepository,
{
    pub fn new(
        booking_repo: Arc<B>,
        payment_repo: Arc<P>,
        ticket_repo: Arc<T>,
        uow: Arc<dyn UnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        email: EmailService,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            booking_repo,
            payment_repo,
            ticket_repo,
            uow,
            gateway,
            email,
            id_generator,
        }
    }

    async fn load_for(&self, actor: Actor, id: i64) -> Result<Payment, PaymentError> {
        let payment = self
            .payment_repo
            .find_by_id(id)
            .await?
            .ok_or(PaymentError::NotFound)?;
        if !actor.can_access(payment.user_id) {
            return Err(PaymentError::Forbidden);
        }
        Ok(payment)
    }

    /// Current state of a payment with its booking and tickets.
    async fn snapshot(&self, payment: Payment) -> Result<Settled, PaymentError> {
        let booking = self
            .booking_repo
            .find_by_id(payment.booking_id)
            .await?
            .ok_or(PaymentError::BookingNotFound)?;
        let tickets = self.ticket_repo.list_for_booking(booking.id).await?;
        Ok(Settled {
            payment,
            booking,
            tickets,
        })
    }

    /// Apply a succeeded intent to the booking.
    ///
    /// Pending booking: confirm it and issue tickets. Already confirmed by
    /// this payment: replay. Confirmed by another payment, or the hold
    /// lapsed meanwhile: refund this payment.
    #[instrument(skip(self, payment), fields(payment_id = payment.id, booking_id = payment.booking_id))]
    async fn finalize(&self, mut payment: Payment, now: DateTime<Utc>) -> Result<Settled, PaymentError> {
        let mut tx = self.uow.begin().await?;
        let mut booking = tx
            .lock_booking(payment.booking_id)
            .await?
            .ok_or(PaymentError::BookingNotFound)?;

        match booking.status {
            BookingStatus::Pending => {
                payment.mark_succeeded(now);
                tx.save_payment(&payment).await?;

                booking.transition(BookingStatus::Confirmed, now)?;
                tx.set_booking_status(booking.id, BookingStatus::Confirmed, now)
                    .await?;

                let tickets: Vec<Ticket> = booking
                    .seats
                    .iter()
                    .map(|seat| Ticket {
                        id: self.id_generator.generate(),
                        ticket_code: codes::ticket_code(),
                        booking_id: booking.id,
                        showtime_id: booking.showtime_id,
                        seat_id: seat.seat_id,
                        user_id: booking.user_id,
                        status: TicketStatus::Valid,
                        issued_at: now,
                        used_at: None,
                    })
                    .collect();
                tx.insert_tickets(&tickets).await?;
                tx.commit().await?;

                metrics::record_payment("succeeded");
                metrics::record_booking("confirmed");
                metrics::record_tickets_issued(tickets.len());
                info!(
                    booking_code = %booking.booking_code,
                    tickets = tickets.len(),
                    "Booking confirmed"
                );

                match self.booking_repo.find_context(booking.id).await {
                    Ok(Some(context)) => self.email.send_booking_confirmation(&context, &tickets).await,
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Failed to load booking for email"),
                }

                Ok(Settled {
                    payment,
                    booking,
                    tickets,
                })
            }
            BookingStatus::Confirmed => {
                tx.rollback().await?;
                let current = self
                    .payment_repo
                    .find_by_id(payment.id)
                    .await?
                    .ok_or(PaymentError::NotFound)?;
                if current.status == PaymentStatus::Succeeded {
                    debug!("Payment already finalised");
                    return self.snapshot(current).await;
                }

                warn!("Booking was paid by another payment, refunding duplicate");
                settlement::refund_intent(self.gateway.as_ref(), &mut payment, now).await?;
                self.payment_repo.save(&payment).await?;
                Err(PaymentError::AlreadyPaid)
            }
            BookingStatus::Cancelled | BookingStatus::Expired => {
                tx.rollback().await?;
                warn!(status = %booking.status, "Hold lapsed before payment settled, refunding");
                settlement::refund_intent(self.gateway.as_ref(), &mut payment, now).await?;
                self.payment_repo.save(&payment).await?;
                Err(PaymentError::HoldExpired)
            }
        }
    }

    /// A payment cancelled with its hold may still have been captured at the
    /// provider. Such a payment goes through `finalize`, which refunds it.
    async fn settle_cancelled(&self, payment: Payment, now: DateTime<Utc>) -> Result<Settled, PaymentError> {
        let intent = self.gateway.retrieve_intent(&payment.provider_payment_id).await?;
        if intent.status != IntentStatus::Succeeded {
            return Err(PaymentError::IntentCanceled);
        }
        warn!(payment_id = payment.id, "Cancelled payment was captured at the provider");
        self.finalize(payment, now).await
    }

    /// Record a failed or cancelled intent. The booking stays Pending.
    async fn record_failure(
        &self,
        payment: &mut Payment,
        status: PaymentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        payment.mark_failed(status, reason, now);
        self.payment_repo.save(payment).await?;
        metrics::record_payment(status.as_str());
        info!(
            payment_id = payment.id,
            booking_id = payment.booking_id,
            status = %status,
            reason = payment.failure_reason.as_deref().unwrap_or(""),
            "Payment did not complete"
        );
        Ok(())
    }
}

#[async_trait]
impl<B, P, T> PaymentService for PaymentServiceImpl<B, P, T>
where
    B: BookingRepository + 'static,
    P: PaymentRepository + 'static,
    T: TicketRepository + 'static,
{
    #[instrument(skip(self, request, idempotency_key), fields(user_id = actor.user_id))]
    async fn create_intent(
        &self,
        actor: Actor,
        request: CreatePaymentRequest,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentResponse, PaymentError> {
        let booking_id = parse_id(&request.booking_id, "booking")?;
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or(PaymentError::BookingNotFound)?;
        if booking.user_id != actor.user_id {
            return Err(PaymentError::Forbidden);
        }

        let attempts = self.payment_repo.list_for_booking(booking_id).await?;
        if attempts.iter().any(|p| p.status == PaymentStatus::Succeeded)
            || booking.status == BookingStatus::Confirmed
        {
            return Err(PaymentError::AlreadyPaid);
        }
        if booking.status != BookingStatus::Pending {
            return Err(PaymentError::BookingNotPending(booking.status));
        }
        if booking.is_hold_lapsed(now) {
            return Err(PaymentError::HoldExpired);
        }
        let attempt = attempts.len() + 1;
        if let Some(pending) = attempts.into_iter().find(|p| p.status == PaymentStatus::Pending) {
            debug!(payment_id = pending.id, "Returning open payment");
            return Ok(pending.into());
        }

        let key = idempotency_key
            .unwrap_or_else(|| format!("booking-{}-attempt-{}", booking_id, attempt));
        let metadata = BTreeMap::from([
            ("booking_id".to_string(), booking.id.to_string()),
            ("booking_code".to_string(), booking.booking_code.clone()),
            ("user_id".to_string(), booking.user_id.to_string()),
        ]);

        let intent = self
            .gateway
            .create_intent(&booking.total, &metadata, &key)
            .await?;

        // A reused client key makes the provider hand back an intent we already stored
        if let Some(existing) = self.payment_repo.find_by_provider_id(&intent.id).await? {
            return Ok(existing.into());
        }

        let payment = Payment {
            id: self.id_generator.generate(),
            booking_id,
            user_id: booking.user_id,
            amount: booking.total.clone(),
            provider: self.gateway.provider().to_string(),
            provider_payment_id: intent.id,
            client_secret: intent.client_secret,
            status: PaymentStatus::Pending,
            failure_reason: None,
            refund_id: None,
            paid_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payment_repo.save(&payment).await?;
        metrics::record_payment("created");
        info!(
            payment_id = payment.id,
            booking_id,
            intent_id = %payment.provider_payment_id,
            amount = payment.amount.amount,
            "Payment intent created"
        );

        Ok(payment.into())
    }

    #[instrument(skip(self), fields(user_id = actor.user_id))]
    async fn confirm(
        &self,
        actor: Actor,
        payment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmationResponse, PaymentError> {
        let mut payment = self.load_for(actor, payment_id).await?;

        match payment.status {
            PaymentStatus::Succeeded => return Ok(self.snapshot(payment).await?.into()),
            PaymentStatus::Failed => {
                return Err(PaymentError::Declined(
                    payment.failure_reason.unwrap_or_else(|| "Payment failed".into()),
                ))
            }
            PaymentStatus::Cancelled => return Ok(self.settle_cancelled(payment, now).await?.into()),
            PaymentStatus::Refunded => return Err(PaymentError::Refunded),
            PaymentStatus::Pending => {}
        }

        let intent = self.gateway.retrieve_intent(&payment.provider_payment_id).await?;
        match intent.status {
            IntentStatus::Succeeded => Ok(self.finalize(payment, now).await?.into()),
            IntentStatus::Failed => {
                let reason = intent
                    .failure_reason
                    .unwrap_or_else(|| "Payment failed".into());
                self.record_failure(&mut payment, PaymentStatus::Failed, Some(reason.clone()), now)
                    .await?;
                Err(PaymentError::Declined(reason))
            }
            IntentStatus::Canceled => {
                self.record_failure(&mut payment, PaymentStatus::Cancelled, intent.failure_reason, now)
                    .await?;
                Err(PaymentError::IntentCanceled)
            }
            IntentStatus::Pending => Ok(self.snapshot(payment).await?.into()),
        }
    }

    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookAck, PaymentError> {
        let event = self.gateway.verify_webhook(payload, signature_header, now)?;
        let ack = WebhookAck { received: true };

        let Some(intent_id) = event.intent_id.as_deref() else {
            debug!(event_id = %event.id, kind = ?event.kind, "Webhook without intent ignored");
            return Ok(ack);
        };
        if let WebhookEventKind::Other(kind) = &event.kind {
            debug!(event_id = %event.id, kind = %kind, "Unhandled webhook event");
            return Ok(ack);
        }

        let Some(mut payment) = self.payment_repo.find_by_provider_id(intent_id).await? else {
            info!(event_id = %event.id, intent_id, "Webhook for unknown intent");
            return Ok(ack);
        };
        let captured_after_cancel = payment.status == PaymentStatus::Cancelled
            && matches!(event.kind, WebhookEventKind::IntentSucceeded);
        if payment.status != PaymentStatus::Pending && !captured_after_cancel {
            debug!(event_id = %event.id, payment_id = payment.id, status = %payment.status, "Webhook replay ignored");
            return Ok(ack);
        }

        match event.kind {
            WebhookEventKind::IntentSucceeded => match self.finalize(payment, now).await {
                Ok(_) | Err(PaymentError::HoldExpired) | Err(PaymentError::AlreadyPaid) => {}
                Err(e) => return Err(e),
            },
            WebhookEventKind::IntentFailed => {
                self.record_failure(&mut payment, PaymentStatus::Failed, event.failure_reason, now)
                    .await?
            }
            WebhookEventKind::IntentCanceled => {
                self.record_failure(&mut payment, PaymentStatus::Cancelled, event.failure_reason, now)
                    .await?
            }
            WebhookEventKind::Other(_) => {}
        }

        Ok(ack)
    }

    async fn get(&self, actor: Actor, id: i64) -> Result<PaymentResponse, PaymentError> {
        Ok(self.load_for(actor, id).await?.into())
    }

    async fn admin_list(&self, query: PaymentListQuery) -> Result<Page<PaymentResponse>, PaymentError> {
        let page = query.page_params();
        let (payments, total) = self.payment_repo.list(query.status, page).await?;
        Ok(Page::new(payments, page, total).map(PaymentResponse::from))
    }

    #[instrument(skip(self))]
    async fn admin_refund(&self, id: i64, now: DateTime<Utc>) -> Result<PaymentResponse, PaymentError> {
        let payment = self
            .payment_repo
            .find_by_id(id)
            .await?
            .ok_or(PaymentError::NotFound)?;
        if payment.status != PaymentStatus::Succeeded {
            return Err(PaymentError::NotRefundable);
        }

        let (booking, payment) =
            settlement::refund_and_cancel(self.uow.as_ref(), self.gateway.as_ref(), payment, now)
                .await?;

        match self.booking_repo.find_context(booking.id).await {
            Ok(Some(context)) => {
                self.email
                    .send_booking_cancellation(&context, Some(&payment.amount))
                    .await
            }
            Ok(None) => {}
            Err(e) => warn!(booking_id = booking.id, error = %e, "Failed to load booking for email"),
        }

        Ok(payment.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::request::CreateBookingRequest;
    use crate::application::services::booking_service::{BookingService, BookingServiceImpl};
    use crate::application::services::test_support::{booking_settings, Fixture, InMemoryDb};
    use crate::infrastructure::email::LogEmailSender;
    use crate::infrastructure::payments::{sign_payload, MockMode, MockPaymentGateway};
    use chrono::Duration;

    const SECRET: &str = "whsec_test";

    fn service_with(
        db: &InMemoryDb,
        gateway: Arc<MockPaymentGateway>,
    ) -> PaymentServiceImpl<InMemoryDb, InMemoryDb, InMemoryDb> {
        PaymentServiceImpl::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            gateway,
            EmailService::new(Arc::new(LogEmailSender)),
            Arc::new(SnowflakeGenerator::new(1, 8)),
        )
    }

    fn bookings_with(
        db: &InMemoryDb,
        gateway: Arc<MockPaymentGateway>,
    ) -> BookingServiceImpl<InMemoryDb, InMemoryDb, InMemoryDb, InMemoryDb> {
        BookingServiceImpl::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            gateway,
            EmailService::new(Arc::new(LogEmailSender)),
            booking_settings(),
            Arc::new(SnowflakeGenerator::new(1, 9)),
        )
    }

    fn gateway(mode: MockMode) -> Arc<MockPaymentGateway> {
        Arc::new(MockPaymentGateway::with_webhook_secret(mode, SECRET, 300))
    }

    fn pay_request(booking: &Booking) -> CreatePaymentRequest {
        CreatePaymentRequest {
            booking_id: booking.id.to_string(),
        }
    }

    fn webhook_body(kind: &str, intent_id: &str) -> String {
        serde_json::json!({
            "id": "evt_test_1",
            "type": kind,
            "data": { "object": { "id": intent_id, "object": "payment_intent" } }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_saga_confirms_booking_and_issues_tickets() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Succeed));
        let hold = fx.hold_booking(&[fx.seats[0].id, fx.seats[1].id]).await;
        let now = Utc::now();

        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        assert_eq!(intent.status, PaymentStatus::Pending);
        assert!(intent.client_secret.is_some());

        let id: i64 = intent.id.parse().unwrap();
        let confirmed = payments.confirm(fx.customer_actor(), id, now).await.unwrap();

        assert_eq!(confirmed.payment.status, PaymentStatus::Succeeded);
        assert_eq!(confirmed.booking.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.tickets.len(), 2);
        assert_eq!(fx.db.tickets_for(hold.id).len(), 2);

        // Confirming again is a no-op
        let again = payments.confirm(fx.customer_actor(), id, now).await.unwrap();
        assert_eq!(again.tickets.len(), 2);
        assert_eq!(fx.db.tickets_for(hold.id).len(), 2);
    }

    #[tokio::test]
    async fn test_open_intent_is_replayed() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Succeed));
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;

        let first = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, Utc::now())
            .await
            .unwrap();
        let second = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_only_owner_may_pay() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Succeed));
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;

        let result = payments
            .create_intent(fx.admin_actor(), pay_request(&hold), None, Utc::now())
            .await;
        assert!(matches!(result, Err(PaymentError::Forbidden)));
    }

    #[tokio::test]
    async fn test_declined_payment_keeps_booking_pending() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Decline));
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;
        let now = Utc::now();

        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        let id: i64 = intent.id.parse().unwrap();

        let result = payments.confirm(fx.customer_actor(), id, now).await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Failed);
        assert_eq!(fx.db.booking(hold.id).status, BookingStatus::Pending);

        // A new attempt opens a fresh intent
        let retry = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        assert_ne!(retry.id, intent.id);
    }

    #[tokio::test]
    async fn test_lapsed_hold_is_refunded() {
        let fx = Fixture::new();
        let gateway = gateway(MockMode::Succeed);
        let payments = service_with(&fx.db, gateway.clone());
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;
        let now = Utc::now();

        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        fx.db.set_booking_status(hold.id, BookingStatus::Expired);

        let id: i64 = intent.id.parse().unwrap();
        let result = payments.confirm(fx.customer_actor(), id, now + Duration::minutes(15)).await;

        assert!(matches!(result, Err(PaymentError::HoldExpired)));
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Refunded);
        assert_eq!(gateway.refund_count(), 1);
        assert!(fx.db.tickets_for(hold.id).is_empty());
    }

    #[tokio::test]
    async fn test_webhook_finalises_once() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Succeed));
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;
        let now = Utc::now();

        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        let body = webhook_body("payment_intent.succeeded", &intent.provider_payment_id);
        let header = sign_payload(SECRET, body.as_bytes(), now.timestamp());

        for _ in 0..2 {
            let ack = payments
                .handle_webhook(body.as_bytes(), &header, now)
                .await
                .unwrap();
            assert!(ack.received);
        }

        assert_eq!(fx.db.booking(hold.id).status, BookingStatus::Confirmed);
        assert_eq!(fx.db.tickets_for(hold.id).len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Succeed));
        let body = webhook_body("payment_intent.succeeded", "pi_mock_000001");
        let now = Utc::now();
        let header = sign_payload("whsec_other", body.as_bytes(), now.timestamp());

        let result = payments.handle_webhook(body.as_bytes(), &header, now).await;
        assert!(matches!(
            result,
            Err(PaymentError::Gateway(GatewayError::InvalidSignature(_)))
        ));
    }

    #[tokio::test]
    async fn test_webhook_failure_marks_payment_failed() {
        let fx = Fixture::new();
        let payments = service_with(&fx.db, gateway(MockMode::Succeed));
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;
        let now = Utc::now();

        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        let body = webhook_body("payment_intent.payment_failed", &intent.provider_payment_id);
        let header = sign_payload(SECRET, body.as_bytes(), now.timestamp());

        payments.handle_webhook(body.as_bytes(), &header, now).await.unwrap();

        let id: i64 = intent.id.parse().unwrap();
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Failed);
        assert_eq!(fx.db.booking(hold.id).status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_admin_refund_cancels_booking() {
        let fx = Fixture::new();
        let gateway = gateway(MockMode::Succeed);
        let payments = service_with(&fx.db, gateway.clone());
        let (booking, payment) = fx.confirmed_booking(gateway.as_ref(), &[fx.seats[0].id]).await;

        let refunded = payments.admin_refund(payment.id, Utc::now()).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert_eq!(fx.db.booking(booking.id).status, BookingStatus::Cancelled);

        let again = payments.admin_refund(payment.id, Utc::now()).await;
        assert!(matches!(again, Err(PaymentError::NotRefundable)));
    }

    #[tokio::test]
    async fn test_sweeper_refunds_payment_captured_as_hold_lapsed() {
        let fx = Fixture::new();
        let gateway = gateway(MockMode::Succeed);
        let payments = service_with(&fx.db, gateway.clone());
        let bookings = bookings_with(&fx.db, gateway.clone());
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;
        let now = Utc::now();

        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, now)
            .await
            .unwrap();
        // The customer completes payment at the provider
        gateway.retrieve_intent(&intent.provider_payment_id).await.unwrap();

        let swept_at = hold.expires_at + Duration::seconds(5);
        assert_eq!(bookings.expire_stale_holds(swept_at).await.unwrap(), 1);

        let id: i64 = intent.id.parse().unwrap();
        assert_eq!(fx.db.booking(hold.id).status, BookingStatus::Expired);
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Refunded);
        assert_eq!(gateway.refund_count(), 1);

        // The late success notification changes nothing
        let body = webhook_body("payment_intent.succeeded", &intent.provider_payment_id);
        let header = sign_payload(SECRET, body.as_bytes(), swept_at.timestamp());
        payments.handle_webhook(body.as_bytes(), &header, swept_at).await.unwrap();
        assert_eq!(gateway.refund_count(), 1);
        assert!(fx.db.tickets_for(hold.id).is_empty());
    }

    /// Leave the hold expired with its payment cancelled locally while the
    /// provider has captured the money.
    async fn captured_after_expiry(
        fx: &Fixture,
        payments: &PaymentServiceImpl<InMemoryDb, InMemoryDb, InMemoryDb>,
        gateway: &MockPaymentGateway,
    ) -> (Booking, PaymentResponse) {
        let hold = fx.hold_booking(&[fx.seats[0].id]).await;
        let intent = payments
            .create_intent(fx.customer_actor(), pay_request(&hold), None, Utc::now())
            .await
            .unwrap();
        gateway.retrieve_intent(&intent.provider_payment_id).await.unwrap();

        let mut tx = fx.db.begin().await.unwrap();
        tx.expire_stale_holds(None, hold.expires_at).await.unwrap();
        tx.cancel_pending_payments(&[hold.id], hold.expires_at).await.unwrap();
        tx.commit().await.unwrap();
        (hold, intent)
    }

    #[tokio::test]
    async fn test_success_webhook_refunds_cancelled_payment() {
        let fx = Fixture::new();
        let gateway = gateway(MockMode::Succeed);
        let payments = service_with(&fx.db, gateway.clone());
        let (hold, intent) = captured_after_expiry(&fx, &payments, &gateway).await;
        let id: i64 = intent.id.parse().unwrap();
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Cancelled);

        let now = Utc::now();
        let body = webhook_body("payment_intent.succeeded", &intent.provider_payment_id);
        let header = sign_payload(SECRET, body.as_bytes(), now.timestamp());
        let ack = payments.handle_webhook(body.as_bytes(), &header, now).await.unwrap();

        assert!(ack.received);
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Refunded);
        assert_eq!(fx.db.booking(hold.id).status, BookingStatus::Expired);
        assert_eq!(gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_refunds_cancelled_payment() {
        let fx = Fixture::new();
        let gateway = gateway(MockMode::Succeed);
        let payments = service_with(&fx.db, gateway.clone());
        let (_, intent) = captured_after_expiry(&fx, &payments, &gateway).await;
        let id: i64 = intent.id.parse().unwrap();

        let result = payments.confirm(fx.customer_actor(), id, Utc::now()).await;
        assert!(matches!(result, Err(PaymentError::HoldExpired)));
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Refunded);
        assert_eq!(gateway.refund_count(), 1);

        let again = payments.confirm(fx.customer_actor(), id, Utc::now()).await;
        assert!(matches!(again, Err(PaymentError::Refunded)));
        assert_eq!(gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn test_taking_lapsed_seat_cancels_previous_payment() {
        let fx = Fixture::new();
        let gateway = gateway(MockMode::Succeed);
        let payments = service_with(&fx.db, gateway.clone());
        let bookings = bookings_with(&fx.db, gateway.clone());
        let seat = fx.seats[0].id.to_string();
        let request = || CreateBookingRequest {
            showtime_id: fx.showtime.id.to_string(),
            seat_ids: vec![seat.clone()],
        };
        let now = Utc::now();

        let first = bookings
            .create_booking(fx.customer_actor(), request(), None, now)
            .await
            .unwrap();
        let first_id: i64 = first.booking.id.parse().unwrap();
        let intent = payments
            .create_intent(
                fx.customer_actor(),
                CreatePaymentRequest {
                    booking_id: first.booking.id.clone(),
                },
                None,
                now,
            )
            .await
            .unwrap();

        let later = fx.db.booking(first_id).expires_at + Duration::seconds(5);
        bookings
            .create_booking(fx.admin_actor(), request(), None, later)
            .await
            .unwrap();

        let id: i64 = intent.id.parse().unwrap();
        assert_eq!(fx.db.booking(first_id).status, BookingStatus::Expired);
        assert_eq!(fx.db.payment(id).status, PaymentStatus::Cancelled);
        let at_provider = gateway.retrieve_intent(&intent.provider_payment_id).await.unwrap();
        assert_eq!(at_provider.status, IntentStatus::Canceled);

        // Nothing is left for the sweeper
        let swept = bookings
            .expire_stale_holds(later + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(swept, 0);
        assert_eq!(gateway.refund_count(), 0);
    }
}
