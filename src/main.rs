//! # Cinema Server
//!
//! Ticket booking API for a multi-branch cinema chain.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database pool and migrations
//! - Payment provider and email adapters
//! - HTTP server and the seat hold sweeper

use anyhow::Result;
use tracing::info;

use cinema_server::config::Settings;
use cinema_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    cinema_server::telemetry::init_tracing();

    info!("Starting Cinema Server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        payment_provider = %settings.payment.provider,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
