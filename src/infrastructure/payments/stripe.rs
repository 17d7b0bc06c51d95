//! Stripe Gateway
//!
//! Payment intents and refunds over the Stripe REST API, plus webhook
//! signature verification shared with the mock gateway.
//!
//! Stripe takes form-encoded bodies and a bearer secret key. Mutating calls
//! carry an `Idempotency-Key` header so a retried request is applied once.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use crate::config::PaymentSettings;
use crate::domain::services::{
    GatewayError, IntentStatus, PaymentGateway, PaymentIntent, RefundReceipt, WebhookEvent,
    WebhookEventKind,
};
use crate::domain::value_objects::Money;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct StripeGateway {
    client: Client,
    secret_key: String,
    webhook_secret: Option<String>,
    api_base: String,
    tolerance_seconds: i64,
}

impl StripeGateway {
    pub fn new(settings: &PaymentSettings) -> Result<Self, GatewayError> {
        let secret_key = settings
            .stripe_secret_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GatewayError::InvalidRequest("Stripe secret key is not configured".into()))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            secret_key,
            webhook_secret: settings.webhook_secret.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            tolerance_seconds: settings.webhook_tolerance_seconds,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Unavailable(format!("Malformed Stripe response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_error_response(status, &body))
    }
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    last_payment_error: Option<StripeErrorDetail>,
}

impl StripeIntent {
    fn into_intent(self) -> PaymentIntent {
        let failure_reason = self.last_payment_error.and_then(|e| e.message);
        let status = intent_status(&self.status, failure_reason.is_some());
        PaymentIntent {
            id: self.id,
            client_secret: self.client_secret,
            amount: Money::new(self.amount, self.currency),
            status,
            failure_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    amount: i64,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

/// Collapse a Stripe intent status onto the states the saga tracks.
fn intent_status(status: &str, has_payment_error: bool) -> IntentStatus {
    match status {
        "succeeded" => IntentStatus::Succeeded,
        "canceled" => IntentStatus::Canceled,
        // A declined attempt drops the intent back to requires_payment_method
        "requires_payment_method" if has_payment_error => IntentStatus::Failed,
        _ => IntentStatus::Pending,
    }
}

fn map_error_response(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<StripeErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();
    let message = detail
        .message
        .unwrap_or_else(|| format!("Stripe responded with {}", status));

    if status == StatusCode::PAYMENT_REQUIRED || detail.kind.as_deref() == Some("card_error") {
        GatewayError::Declined(message)
    } else if status == StatusCode::NOT_FOUND {
        GatewayError::NotFound(message)
    } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        GatewayError::InvalidRequest(message)
    } else {
        GatewayError::Unavailable(message)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> &'static str {
        "stripe"
    }

    #[instrument(skip(self, metadata), fields(amount = amount.amount))]
    async fn create_intent(
        &self,
        amount: &Money,
        metadata: &BTreeMap<String, String>,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".into(), amount.amount.to_string()),
            ("currency".into(), amount.currency.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (key, value) in metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        let request = self
            .client
            .post(self.url("/v1/payment_intents"))
            .header("Idempotency-Key", idempotency_key)
            .form(&params);
        let intent: StripeIntent = self.send(request).await?;
        debug!(intent_id = %intent.id, "Stripe payment intent created");
        Ok(intent.into_intent())
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let request = self
            .client
            .get(self.url(&format!("/v1/payment_intents/{}", intent_id)));
        let intent: StripeIntent = self.send(request).await?;
        Ok(intent.into_intent())
    }

    #[instrument(skip(self))]
    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let request = self
            .client
            .post(self.url(&format!("/v1/payment_intents/{}/cancel", intent_id)));
        let intent: StripeIntent = self.send(request).await?;
        Ok(intent.into_intent())
    }

    #[instrument(skip(self), fields(amount = amount.amount))]
    async fn refund(
        &self,
        intent_id: &str,
        amount: &Money,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        let params = [
            ("payment_intent", intent_id.to_string()),
            ("amount", amount.amount.to_string()),
        ];
        let request = self
            .client
            .post(self.url("/v1/refunds"))
            .header("Idempotency-Key", idempotency_key)
            .form(&params);
        let refund: StripeRefund = self.send(request).await?;
        Ok(RefundReceipt {
            id: refund.id,
            amount: refund.amount,
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, GatewayError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidSignature("Webhook secret is not configured".into()))?;
        verify_signature(secret, payload, signature_header, self.tolerance_seconds, now)?;
        parse_event(payload)
    }
}

/// Check a `t=<unix>,v1=<hex>` signature header.
///
/// The signed content is `"{t}.{payload}"` under HMAC-SHA256. Any `v1`
/// entry may match, which allows secret rotation. Timestamps further than
/// `tolerance_seconds` from `now` in either direction are rejected.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    tolerance_seconds: i64,
    now: DateTime<Utc>,
) -> Result<(), GatewayError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| GatewayError::InvalidSignature("Missing signature timestamp".into()))?;
    if signatures.is_empty() {
        return Err(GatewayError::InvalidSignature("Missing v1 signature".into()));
    }
    if (now.timestamp() - timestamp).abs() > tolerance_seconds {
        return Err(GatewayError::InvalidSignature(
            "Signature timestamp outside tolerance".into(),
        ));
    }

    let verified = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if verified {
        Ok(())
    } else {
        warn!("Webhook signature mismatch");
        Err(GatewayError::InvalidSignature("Signature mismatch".into()))
    }
}

/// Produce a signature header for `payload`, as the provider would.
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: Option<String>,
    last_payment_error: Option<StripeErrorDetail>,
    cancellation_reason: Option<String>,
}

/// Decode a verified event body.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, GatewayError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::InvalidRequest(format!("Malformed webhook event: {}", e)))?;

    let kind = match envelope.kind.as_str() {
        "payment_intent.succeeded" => WebhookEventKind::IntentSucceeded,
        "payment_intent.payment_failed" => WebhookEventKind::IntentFailed,
        "payment_intent.canceled" => WebhookEventKind::IntentCanceled,
        other => WebhookEventKind::Other(other.to_string()),
    };
    let object = envelope.data.object;
    let failure_reason = object
        .last_payment_error
        .and_then(|e| e.message)
        .or(object.cancellation_reason);

    Ok(WebhookEvent {
        id: envelope.id,
        kind,
        intent_id: object.id,
        failure_reason,
    })
}
