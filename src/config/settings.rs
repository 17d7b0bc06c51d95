//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Seat hold and booking policy
    pub booking: BookingSettings,

    /// Payment provider configuration
    pub payment: PaymentSettings,

    /// Outgoing email configuration
    pub email: EmailSettings,

    /// Catalog cache configuration
    pub cache: CacheSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,

    /// Public base URL used in email links
    pub public_url: String,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,

    /// Refresh token expiry in days
    pub refresh_token_expiry_days: i64,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Turn the limiter off entirely (local development, tests)
    pub enabled: bool,

    /// Requests per minute on auth endpoints
    pub auth_per_minute: u32,

    /// Requests per minute on general API endpoints
    pub api_per_minute: u32,

    /// Requests per minute on booking and payment endpoints
    pub checkout_per_minute: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Booking policy.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingSettings {
    /// How long a pending booking holds its seats
    pub hold_minutes: i64,

    /// Upper bound on seats in one booking
    pub max_seats_per_booking: usize,

    /// Sales close this many minutes before the showtime starts
    pub sales_cutoff_minutes: i64,

    /// Confirmed bookings may be cancelled up to this many hours before start
    pub cancellation_cutoff_hours: i64,

    /// Gap required between consecutive showtimes in one hall
    pub cleaning_buffer_minutes: i64,

    /// Interval of the stale-hold sweeper
    pub expiry_sweep_seconds: u64,

    /// ISO currency code for prices (lowercase)
    pub currency: String,
}

/// Payment provider selection.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSettings {
    /// "stripe" or "mock"
    pub provider: String,

    /// Stripe secret API key
    pub stripe_secret_key: Option<String>,

    /// Signing secret for incoming webhooks
    pub webhook_secret: Option<String>,

    /// Base URL of the provider API
    pub api_base: String,

    /// Accepted clock skew for webhook timestamps, in seconds
    pub webhook_tolerance_seconds: i64,
}

/// Outgoing email configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// "smtp" or "log"
    pub provider: String,

    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    pub from_address: String,
    pub from_name: String,
}

/// Catalog cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// TTL for cached movie listings
    pub catalog_ttl_seconds: u64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if it fails [`Settings::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::defaults(Config::builder(), &environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "payment.stripe_secret_key",
                std::env::var("STRIPE_SECRET_KEY").ok(),
            )?
            .set_override_option(
                "payment.webhook_secret",
                std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate().map(|_| settings))
    }

    /// Built-in defaults applied before any file or environment source.
    pub fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("jwt.access_token_expiry_minutes", 15)?
            .set_default("jwt.refresh_token_expiry_days", 7)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", 1704067200000_u64)?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.auth_per_minute", 10)?
            .set_default("rate_limit.api_per_minute", 120)?
            .set_default("rate_limit.checkout_per_minute", 20)?
            .set_default("cors.allowed_origins", vec!["http://localhost:5173"])?
            .set_default("booking.hold_minutes", 10)?
            .set_default("booking.max_seats_per_booking", 10)?
            .set_default("booking.sales_cutoff_minutes", 10)?
            .set_default("booking.cancellation_cutoff_hours", 2)?
            .set_default("booking.cleaning_buffer_minutes", 15)?
            .set_default("booking.expiry_sweep_seconds", 60)?
            .set_default("booking.currency", "usd")?
            .set_default("payment.provider", "mock")?
            .set_default("payment.api_base", "https://api.stripe.com")?
            .set_default("payment.webhook_tolerance_seconds", 300)?
            .set_default("email.provider", "log")?
            .set_default("email.smtp_port", 587)?
            .set_default("email.from_address", "tickets@cinema.local")?
            .set_default("email.from_name", "Cinema Tickets")?
            .set_default("cache.catalog_ttl_seconds", 60)
    }

    /// Cross-field checks the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }

        match self.payment.provider.as_str() {
            "mock" => {}
            "stripe" => {
                if self.payment.stripe_secret_key.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::Message(
                        "payment.provider = stripe requires STRIPE_SECRET_KEY".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Message(format!(
                    "Unknown payment provider '{}'",
                    other
                )))
            }
        }

        match self.email.provider.as_str() {
            "log" => {}
            "smtp" if self.email.smtp_host.is_some() => {}
            "smtp" => {
                return Err(ConfigError::Message(
                    "email.provider = smtp requires email.smtp_host".into(),
                ))
            }
            other => {
                return Err(ConfigError::Message(format!(
                    "Unknown email provider '{}'",
                    other
                )))
            }
        }

        if self.booking.hold_minutes <= 0 || self.booking.max_seats_per_booking == 0 {
            return Err(ConfigError::Message(
                "booking.hold_minutes and booking.max_seats_per_booking must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings::defaults(Config::builder(), "test")
            .and_then(|b| b.set_override("database.url", "postgres://localhost/cinema_test"))
            .and_then(|b| b.set_override("jwt.secret", "a".repeat(MIN_JWT_SECRET_LENGTH)))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .unwrap()
    }

    #[test]
    fn test_defaults_deserialize() {
        let settings = base();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.booking.hold_minutes, 10);
        assert_eq!(settings.payment.provider, "mock");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut settings = base();
        settings.jwt.secret = "short".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_stripe_requires_secret_key() {
        let mut settings = base();
        settings.payment.provider = "stripe".into();
        assert!(settings.validate().is_err());

        settings.payment.stripe_secret_key = Some("sk_test_123".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_smtp_requires_host() {
        let mut settings = base();
        settings.email.provider = "smtp".into();
        assert!(settings.validate().is_err());
    }
}
