//! Payment Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{Money, Payment, PaymentRepository, PaymentStatus};
use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    id: i64,
    booking_id: i64,
    user_id: i64,
    amount: i64,
    currency: String,
    provider: String,
    provider_payment_id: String,
    client_secret: Option<String>,
    status: String,
    failure_reason: Option<String>,
    refund_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    pub(crate) fn into_payment(self) -> Result<Payment, AppError> {
        let status: PaymentStatus = self.status.parse().map_err(AppError::Internal)?;
        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            user_id: self.user_id,
            amount: Money::new(self.amount, self.currency),
            provider: self.provider,
            provider_payment_id: self.provider_payment_id,
            client_secret: self.client_secret,
            status,
            failure_reason: self.failure_reason,
            refund_id: self.refund_id,
            paid_at: self.paid_at,
            refunded_at: self.refunded_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) const PAYMENT_COLUMNS: &str = "id, booking_id, user_id, amount, currency, provider, \
     provider_payment_id, client_secret, status, failure_reason, refund_id, paid_at, \
     refunded_at, created_at, updated_at";

/// Insert a payment or update its mutable fields.
pub(crate) async fn upsert_payment(
    conn: &mut PgConnection,
    payment: &Payment,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO payments (id, booking_id, user_id, amount, currency, provider,
                              provider_payment_id, client_secret, status, failure_reason,
                              refund_id, paid_at, refunded_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            failure_reason = EXCLUDED.failure_reason,
            refund_id = EXCLUDED.refund_id,
            paid_at = EXCLUDED.paid_at,
            refunded_at = EXCLUDED.refunded_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(payment.id)
    .bind(payment.booking_id)
    .bind(payment.user_id)
    .bind(payment.amount.amount)
    .bind(&payment.amount.currency)
    .bind(&payment.provider)
    .bind(&payment.provider_payment_id)
    .bind(&payment.client_secret)
    .bind(payment.status.as_str())
    .bind(&payment.failure_reason)
    .bind(&payment.refund_id)
    .bind(payment.paid_at)
    .bind(payment.refunded_at)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(conn)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "Payment intent is already recorded"))?;

    Ok(())
}

/// PostgreSQL payment repository implementation.
#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE provider_payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(provider_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>, AppError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 ORDER BY created_at, id",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn list(
        &self,
        status: Option<PaymentStatus>,
        page: PageParams,
    ) -> Result<(Vec<Payment>, i64), AppError> {
        let status = status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {}
            FROM payments
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payments WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let payments = rows
            .into_iter()
            .map(PaymentRow::into_payment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((payments, total))
    }

    async fn save(&self, payment: &Payment) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        upsert_payment(&mut conn, payment).await
    }
}
