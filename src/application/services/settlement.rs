//! Expiry and refund steps shared by booking cancellation and payment handling.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::services::PaymentGateway;
use crate::domain::{Booking, BookingStatus, Payment, TicketStatus, TransactionScope, UnitOfWork};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Holds expired in one transaction, with the payments cancelled alongside.
#[derive(Debug, Default)]
pub(crate) struct ExpiredHolds {
    pub booking_ids: Vec<i64>,
    pub payments: Vec<Payment>,
}

/// Expire lapsed holds (optionally for one showtime) and cancel their
/// Pending payments on the same transaction.
///
/// The provider intents are left open; cancel them once the transaction
/// has committed.
pub(crate) async fn expire_holds(
    tx: &mut dyn TransactionScope,
    showtime_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ExpiredHolds, AppError> {
    let booking_ids = tx.expire_stale_holds(showtime_id, now).await?;
    if booking_ids.is_empty() {
        return Ok(ExpiredHolds::default());
    }
    let payments = tx.cancel_pending_payments(&booking_ids, now).await?;
    Ok(ExpiredHolds {
        booking_ids,
        payments,
    })
}

/// Refund a payment at the provider and mark it Refunded. Not persisted.
///
/// The idempotency key is derived from the payment id, so retrying a
/// refund that reached the provider never refunds twice.
pub(crate) async fn refund_intent(
    gateway: &dyn PaymentGateway,
    payment: &mut Payment,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let receipt = gateway
        .refund(
            &payment.provider_payment_id,
            &payment.amount,
            &format!("refund-payment-{}", payment.id),
        )
        .await?;
    payment.mark_refunded(receipt.id, now);
    metrics::record_payment("refunded");
    info!(
        payment_id = payment.id,
        booking_id = payment.booking_id,
        amount = payment.amount.amount,
        "Payment refunded"
    );
    Ok(())
}

/// Refund a succeeded payment and cancel what it paid for.
///
/// The booking moves to Cancelled (unless already out of play), its
/// tickets are cancelled and its seats released, all in one transaction
/// after the provider accepted the refund.
pub(crate) async fn refund_and_cancel(
    uow: &dyn UnitOfWork,
    gateway: &dyn PaymentGateway,
    mut payment: Payment,
    now: DateTime<Utc>,
) -> Result<(Booking, Payment), AppError> {
    refund_intent(gateway, &mut payment, now).await?;

    let mut tx = uow.begin().await?;
    let mut booking = tx
        .lock_booking(payment.booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", payment.booking_id)))?;

    if booking.status.holds_seats() {
        booking.transition(BookingStatus::Cancelled, now)?;
        tx.set_booking_status(booking.id, BookingStatus::Cancelled, now)
            .await?;
        tx.release_seats(&[booking.id]).await?;
    }
    tx.set_ticket_statuses(booking.id, TicketStatus::Cancelled)
        .await?;
    tx.save_payment(&payment).await?;
    tx.commit().await?;

    metrics::record_booking("cancelled");
    Ok((booking, payment))
}
