//! Health Check Handlers
//!
//! Liveness and readiness probes for the load balancer / orchestrator.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the process up?)
//! - `GET /health/ready` - Readiness probe (database and Redis)

use std::future::Future;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const DATABASE_SLOW_MS: u64 = 100;
const REDIS_SLOW_MS: u64 = 50;

/// Pin the uptime clock to process start.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness report
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub environment: String,
    pub payment_provider: String,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
}

/// Result of probing one dependency
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe; never touches dependencies
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe: 503 when the database is down.
///
/// Redis only degrades readiness since the catalog cache and the rate
/// limiter keep working without it.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = probe("Database", DATABASE_SLOW_MS, async {
        sqlx::query("SELECT 1").execute(&state.db).await.map(|_| ())
    });
    let redis = probe("Redis", REDIS_SLOW_MS, state.redis.ping());
    let (database, redis) = tokio::join!(database, redis);

    let status = determine_overall_status(&database, &redis);
    let response = DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.settings.environment.clone(),
        payment_provider: state.settings.payment.provider.clone(),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks { database, redis },
    };

    let status_code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Time a dependency check, bounded by `PROBE_TIMEOUT`.
async fn probe<F, E>(name: &str, slow_ms: u64, check: F) -> ServiceHealth
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(Ok(())) => {
            let latency = start.elapsed().as_millis() as u64;
            ServiceHealth {
                status: classify_latency(latency, slow_ms),
                latency_ms: Some(latency),
                message: None,
            }
        }
        Ok(Err(e)) => ServiceHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(format!("{} connection failed: {}", name, e)),
        },
        Err(_) => ServiceHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(format!("{} did not answer within {:?}", name, PROBE_TIMEOUT)),
        },
    }
}

fn classify_latency(latency_ms: u64, slow_ms: u64) -> HealthStatus {
    if latency_ms < slow_ms {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

/// The database is critical, Redis is not.
fn determine_overall_status(db: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    match (db.status, redis.status) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    }
}
