//! Rate Limiting Middleware
//!
//! Redis-based distributed rate limiting using a sliding window. Auth,
//! general API and checkout (booking/payment creation) traffic are counted
//! separately with limits from `rate_limit` settings.
//!
//! The limiter fails open: when Redis is unreachable the request is let
//! through and the failure is logged.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::config::RateLimitSettings;
use crate::infrastructure::cache::{keys, RedisHandle};
use crate::presentation::middleware::auth::AuthUser;
use crate::shared::error::{AppError, ErrorResponse};
use crate::startup::AppState;

const WINDOW_SECONDS: u64 = 60;

/// Atomically trims the window, counts it and records the request if allowed.
static SLIDING_WINDOW: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local key = KEYS[1]
        local now_ms = tonumber(ARGV[1])
        local window_start = tonumber(ARGV[2])
        local max_requests = tonumber(ARGV[3])
        local window_seconds = tonumber(ARGV[4])

        redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
        local current_count = redis.call('ZCARD', key)

        if current_count < max_requests then
            local member = now_ms .. ':' .. math.random(1000000)
            redis.call('ZADD', key, now_ms, member)
            redis.call('EXPIRE', key, window_seconds + 1)
            return {1, current_count + 1, max_requests}
        else
            local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
            local retry_after = 0
            if oldest and #oldest >= 2 then
                retry_after = oldest[2] + (window_seconds * 1000) - now_ms
            end
            return {0, current_count, max_requests, retry_after}
        end
        "#,
    )
});

/// Traffic classes with their own budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    /// Register, login, refresh
    Auth,
    /// Everything under `/api/v1`
    Api,
    /// Creating bookings and payment intents
    Checkout,
}

impl EndpointType {
    /// Requests allowed per minute.
    pub fn limit(&self, settings: &RateLimitSettings) -> u32 {
        match self {
            EndpointType::Auth => settings.auth_per_minute,
            EndpointType::Api => settings.api_per_minute,
            EndpointType::Checkout => settings.checkout_per_minute,
        }
    }

    fn key_prefix(&self) -> &'static str {
        match self {
            EndpointType::Auth => "rl:auth",
            EndpointType::Api => "rl:api",
            EndpointType::Checkout => "rl:checkout",
        }
    }
}

/// Information about rate limit status returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in the current window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Unix timestamp when the rate limit resets
    pub reset_at: i64,
    /// Seconds until the rate limit resets
    pub retry_after: u64,
}

#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

/// Sliding-window limiter over a Redis sorted set.
///
/// Members are request timestamps with a random suffix, scored by the
/// timestamp in milliseconds.
#[derive(Clone)]
pub struct RateLimiter {
    redis: RedisHandle,
    endpoint_type: EndpointType,
    limit: u32,
}

impl RateLimiter {
    pub fn new(redis: RedisHandle, endpoint_type: EndpointType, settings: &RateLimitSettings) -> Self {
        Self {
            redis,
            endpoint_type,
            limit: endpoint_type.limit(settings),
        }
    }

    /// `Ok` when the request may proceed, `Err` when the window is full.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitInfo> {
        let key = keys::rate_limit(self.endpoint_type.key_prefix(), identifier);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_start = now_ms - (WINDOW_SECONDS * 1000) as i64;
        let reset_at = now_ms / 1000 + WINDOW_SECONDS as i64;

        let result: Result<Vec<i64>, redis::RedisError> = async {
            let mut conn = self.redis.connection().await?;
            SLIDING_WINDOW
                .key(&key)
                .arg(now_ms)
                .arg(window_start)
                .arg(self.limit as i64)
                .arg(WINDOW_SECONDS as i64)
                .invoke_async(&mut conn)
                .await
        }
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Rate limiter Redis error, allowing request");
                return Ok(RateLimitInfo {
                    limit: self.limit,
                    remaining: self.limit,
                    reset_at,
                    retry_after: 0,
                });
            }
        };

        Self::interpret(&result, self.limit, reset_at)
    }

    fn interpret(result: &[i64], limit: u32, reset_at: i64) -> Result<RateLimitInfo, RateLimitInfo> {
        let allowed = result.first() == Some(&1);
        let current_count = result.get(1).copied().unwrap_or(0).max(0) as u32;
        let retry_ms = result.get(3).copied().unwrap_or(0).max(0);

        let info = RateLimitInfo {
            limit,
            remaining: limit.saturating_sub(current_count),
            reset_at,
            retry_after: if allowed { 0 } else { (retry_ms as u64).div_ceil(1000) },
        };

        if allowed {
            Ok(info)
        } else {
            Err(info)
        }
    }
}

/// Identify the caller: authenticated user first, then proxy headers, then
/// the socket address.
fn extract_identifier(request: &Request, client_ip: Option<IpAddr>) -> String {
    if let Some(auth_user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", auth_user.user_id);
    }

    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| ip.parse::<IpAddr>().is_ok())
            .map(str::to_string)
    };

    if let Some(ip) = header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip")) {
        return format!("ip:{}", ip);
    }

    match client_ip {
        Some(ip) => format!("ip:{}", ip),
        None => {
            tracing::warn!("Could not determine client identifier for rate limiting");
            "ip:unknown".to_string()
        }
    }
}

pub async fn rate_limit_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Auth).await
}

pub async fn rate_limit_api(State(state): State<AppState>, request: Request, next: Next) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Api).await
}

pub async fn rate_limit_checkout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Checkout).await
}

async fn rate_limit_inner(
    state: AppState,
    request: Request,
    next: Next,
    endpoint_type: EndpointType,
) -> Response {
    if !state.settings.rate_limit.enabled {
        return next.run(request).await;
    }

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let identifier = extract_identifier(&request, client_ip);
    let limiter = RateLimiter::new(state.redis.clone(), endpoint_type, &state.settings.rate_limit);

    match limiter.check(&identifier).await {
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(info) => {
            tracing::warn!(
                identifier = %identifier,
                endpoint_type = ?endpoint_type,
                "Rate limit exceeded"
            );
            create_rate_limit_response(info)
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_at));
}

fn create_rate_limit_response(info: RateLimitInfo) -> Response {
    let info = RateLimitInfo { remaining: 0, ..info };
    let body = RateLimitExceededResponse {
        error: ErrorResponse {
            code: AppError::RateLimited.code(),
            message: "You are being rate limited. Please slow down.".to_string(),
            errors: None,
        },
        rate_limit: info.clone(),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(info.retry_after));
    add_rate_limit_headers(response.headers_mut(), &info);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use pretty_assertions::assert_eq;

    fn settings() -> RateLimitSettings {
        RateLimitSettings {
            enabled: true,
            auth_per_minute: 10,
            api_per_minute: 120,
            checkout_per_minute: 20,
        }
    }

    #[test]
    fn test_limits_come_from_settings() {
        let settings = settings();
        assert_eq!(EndpointType::Auth.limit(&settings), 10);
        assert_eq!(EndpointType::Api.limit(&settings), 120);
        assert_eq!(EndpointType::Checkout.limit(&settings), 20);
    }

    #[test]
    fn test_interpret_allowed_and_denied() {
        let allowed = RateLimiter::interpret(&[1, 3, 10], 10, 1_000).unwrap();
        assert_eq!(allowed.remaining, 7);
        assert_eq!(allowed.retry_after, 0);

        let denied = RateLimiter::interpret(&[0, 10, 10, 1_500], 10, 1_000).unwrap_err();
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after, 2);
    }

    #[test]
    fn test_identifier_prefers_user_then_forwarded_ip() {
        let mut request = http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_identifier(&request, None), "ip:203.0.113.9");

        request.extensions_mut().insert(AuthUser {
            user_id: 42,
            role: crate::domain::UserRole::Customer,
        });
        assert_eq!(extract_identifier(&request, None), "user:42");
    }

    #[test]
    fn test_identifier_falls_back_to_socket() {
        let request = http::Request::builder()
            .header("x-forwarded-for", "not-an-ip")
            .body(Body::empty())
            .unwrap();
        let ip: IpAddr = "198.51.100.7".parse().unwrap();
        assert_eq!(extract_identifier(&request, Some(ip)), "ip:198.51.100.7");
        assert_eq!(extract_identifier(&request, None), "ip:unknown");
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let response = create_rate_limit_response(RateLimitInfo {
            limit: 10,
            remaining: 3,
            reset_at: 1_700_000_000,
            retry_after: 12,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
    }
}
