//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories and unit of work (PostgreSQL)
//! - Catalog cache and rate limit storage (Redis)
//! - Payment gateways (Stripe, mock)
//! - Email senders (SMTP, log)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod email;
pub mod metrics;
pub mod payments;
pub mod repositories;
