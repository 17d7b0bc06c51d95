//! Payment Gateways
//!
//! `PaymentGateway` implementations selected by `payment.provider`.

mod mock;
mod stripe;

pub use mock::{MockMode, MockPaymentGateway, DEFAULT_WEBHOOK_SECRET};
pub use stripe::{parse_event, sign_payload, verify_signature, StripeGateway};

use std::sync::Arc;

use crate::config::PaymentSettings;
use crate::domain::services::{GatewayError, PaymentGateway};

/// Build the configured gateway.
pub fn build_gateway(settings: &PaymentSettings) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    match settings.provider.as_str() {
        "stripe" => Ok(Arc::new(StripeGateway::new(settings)?)),
        "mock" => {
            let secret = settings
                .webhook_secret
                .clone()
                .unwrap_or_else(|| DEFAULT_WEBHOOK_SECRET.to_string());
            Ok(Arc::new(MockPaymentGateway::with_webhook_secret(
                MockMode::Succeed,
                secret,
                settings.webhook_tolerance_seconds,
            )))
        }
        other => Err(GatewayError::InvalidRequest(format!(
            "Unknown payment provider: {}",
            other
        ))),
    }
}
