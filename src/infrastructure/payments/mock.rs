//! Mock payment gateway for development and testing.
//!
//! Intents live in memory. A created intent is Pending and settles on its
//! first retrieve: Succeeded normally, Failed when the gateway declines.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::stripe::{parse_event, verify_signature};
use crate::domain::services::{
    GatewayError, IntentStatus, PaymentGateway, PaymentIntent, RefundReceipt, WebhookEvent,
};
use crate::domain::value_objects::Money;

/// Secret used when no webhook secret is configured.
pub const DEFAULT_WEBHOOK_SECRET: &str = "whsec_mock";

const DECLINE_REASON: &str = "Your card was declined.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    Succeed,
    Decline,
}

pub struct MockPaymentGateway {
    mode: MockMode,
    webhook_secret: String,
    tolerance_seconds: i64,
    intents: DashMap<String, PaymentIntent>,
    by_idempotency_key: DashMap<String, String>,
    refunds: DashMap<String, RefundReceipt>,
    sequence: AtomicU64,
}

impl MockPaymentGateway {
    pub fn new(mode: MockMode) -> Self {
        Self::with_webhook_secret(mode, DEFAULT_WEBHOOK_SECRET, 300)
    }

    pub fn with_webhook_secret(mode: MockMode, secret: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self {
            mode,
            webhook_secret: secret.into(),
            tolerance_seconds,
            intents: DashMap::new(),
            by_idempotency_key: DashMap::new(),
            refunds: DashMap::new(),
            sequence: AtomicU64::new(1),
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    pub fn shared(mode: MockMode) -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new(mode))
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_mock_{:06}", prefix, self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of refunds issued, for assertions in tests.
    pub fn refund_count(&self) -> usize {
        self.refunds.len()
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new(MockMode::Succeed)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn create_intent(
        &self,
        amount: &Money,
        metadata: &BTreeMap<String, String>,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidRequest("Amount must be positive".into()));
        }
        if let Some(existing) = self.by_idempotency_key.get(idempotency_key) {
            if let Some(intent) = self.intents.get(existing.value()) {
                return Ok(intent.clone());
            }
        }

        let id = self.next_id("pi");
        let intent = PaymentIntent {
            client_secret: Some(format!("{}_secret", id)),
            id: id.clone(),
            amount: amount.clone(),
            status: IntentStatus::Pending,
            failure_reason: None,
        };
        self.intents.insert(id.clone(), intent.clone());
        self.by_idempotency_key.insert(idempotency_key.to_string(), id.clone());

        tracing::info!(
            intent_id = %id,
            amount = amount.amount,
            booking_id = metadata.get("booking_id").map(String::as_str).unwrap_or(""),
            "Mock payment intent created"
        );
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let mut intent = self
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))?;

        if intent.status == IntentStatus::Pending {
            match self.mode {
                MockMode::Succeed => intent.status = IntentStatus::Succeeded,
                MockMode::Decline => {
                    intent.status = IntentStatus::Failed;
                    intent.failure_reason = Some(DECLINE_REASON.into());
                }
            }
        }
        Ok(intent.clone())
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let mut intent = self
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))?;

        if intent.status == IntentStatus::Succeeded {
            return Err(GatewayError::InvalidRequest(
                "A succeeded intent cannot be canceled".into(),
            ));
        }
        intent.status = IntentStatus::Canceled;
        Ok(intent.clone())
    }

    async fn refund(
        &self,
        intent_id: &str,
        amount: &Money,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        if let Some(existing) = self.refunds.get(idempotency_key) {
            return Ok(existing.clone());
        }
        let intent = self
            .intents
            .get(intent_id)
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))?;
        if intent.status != IntentStatus::Succeeded {
            return Err(GatewayError::InvalidRequest(
                "Only succeeded intents can be refunded".into(),
            ));
        }
        if amount.amount > intent.amount.amount {
            return Err(GatewayError::InvalidRequest(
                "Refund exceeds the captured amount".into(),
            ));
        }

        let receipt = RefundReceipt {
            id: self.next_id("re"),
            amount: amount.amount,
        };
        self.refunds.insert(idempotency_key.to_string(), receipt.clone());

        tracing::info!(
            intent_id = %intent_id,
            refund_id = %receipt.id,
            amount = amount.amount,
            "Mock refund processed"
        );
        Ok(receipt)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, GatewayError> {
        verify_signature(&self.webhook_secret, payload, signature_header, self.tolerance_seconds, now)?;
        parse_event(payload)
    }
}
