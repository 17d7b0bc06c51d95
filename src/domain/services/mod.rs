//! # Domain Services
//!
//! Business rules that don't naturally belong to a single entity, plus the
//! ports for external systems.
//!
//! - **pricing**: seat and booking prices
//! - **scheduling**: showtime overlap and sales windows
//! - **payment_gateway**: card processor port
//! - **email_sender**: outgoing mail port

pub mod email_sender;
pub mod payment_gateway;
pub mod pricing;
pub mod scheduling;

pub use email_sender::{EmailError, EmailMessage, EmailSender};
#[cfg(test)]
pub use email_sender::MockEmailSender;
pub use payment_gateway::{
    GatewayError, IntentStatus, PaymentGateway, PaymentIntent, RefundReceipt, WebhookEvent,
    WebhookEventKind,
};
