//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;

use crate::application::jobs::HoldSweeper;
use crate::application::services::EmailService;
use crate::config::Settings;
use crate::domain::services::PaymentGateway;
use crate::infrastructure::cache::{Cache, RedisCache, RedisHandle};
use crate::infrastructure::{database, email, payments};
use crate::presentation::http::handlers::{booking, health};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: RedisHandle,
    pub cache: Arc<dyn Cache>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub payments: Arc<dyn PaymentGateway>,
    pub email: EmailService,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the adapters named in `settings` around an existing pool.
    ///
    /// Nothing here talks to the network: Redis connects on first use.
    pub fn build(settings: Settings, db: PgPool) -> Result<Self> {
        let redis = RedisHandle::new(&settings.redis).context("Invalid Redis URL")?;
        let cache: Arc<dyn Cache> = Arc::new(RedisCache::new(redis.clone()));

        let payments = payments::build_gateway(&settings.payment)
            .context("Failed to configure payment provider")?;
        let sender =
            email::build_sender(&settings.email).context("Failed to configure email sender")?;

        let snowflake = Arc::new(SnowflakeGenerator::with_epoch(
            settings.snowflake.epoch,
            settings.snowflake.machine_id as u64,
            0,
        ));

        tracing::info!(
            payment_provider = %settings.payment.provider,
            email_provider = %settings.email.provider,
            "Adapters configured"
        );

        Ok(Self {
            db,
            redis,
            cache,
            snowflake,
            payments,
            email: EmailService::new(sender),
            settings: Arc::new(settings),
        })
    }
}

/// The full HTTP stack: routes plus tracing and CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    sweeper: JoinHandle<()>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let db = database::create_pool(&settings.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
        }

        let addr = settings.server_addr();
        let state = AppState::build(settings, db)?;

        let sweeper = HoldSweeper::new(
            Arc::new(booking::service(&state)),
            state.settings.booking.expiry_sweep_seconds,
        );
        let sweeper = tokio::spawn(sweeper.run());

        let router = build_router(state);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            sweeper,
        })
    }

    /// Serve until SIGINT/SIGTERM, then stop the background sweeper.
    pub async fn run_until_stopped(self) -> Result<()> {
        let service = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(self.listener, service)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.sweeper.abort();
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
