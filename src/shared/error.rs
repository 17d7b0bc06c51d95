//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Map a sqlx error, turning unique violations into a conflict with the given message.
    pub fn from_unique_violation(err: sqlx::Error, conflict_message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(conflict_message.to_string())
            }
            _ => AppError::Database(err),
        }
    }

    /// Numeric application code carried in the error body.
    pub fn code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 10001,
            AppError::BadRequest(_) => 10002,
            AppError::Unauthorized(_) => 10003,
            AppError::Forbidden(_) => 10004,
            AppError::Conflict(_) => 10005,
            AppError::RateLimited => 10006,
            AppError::Validation(_) => 10007,
            AppError::Gone(_) => 10008,
            AppError::PaymentRequired(_) => 10009,
            AppError::Upstream(_) => 10010,
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => 10000,
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::Gone(msg)
            | AppError::PaymentRequired(msg)
            | AppError::Validation(msg) => msg.clone(),
            AppError::RateLimited => "Rate limited".into(),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                "Payment provider unavailable".into()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".into()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".into()
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                "Internal server error".into()
            }
        };

        let body = ErrorResponse {
            code,
            message,
            errors: None,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(AppError::NotFound("x".into()), StatusCode::NOT_FOUND ; "not found")]
    #[test_case(AppError::Validation("x".into()), StatusCode::BAD_REQUEST ; "validation")]
    #[test_case(AppError::Conflict("x".into()), StatusCode::CONFLICT ; "conflict")]
    #[test_case(AppError::Gone("x".into()), StatusCode::GONE ; "gone")]
    #[test_case(AppError::PaymentRequired("x".into()), StatusCode::PAYMENT_REQUIRED ; "payment required")]
    #[test_case(AppError::Upstream("x".into()), StatusCode::BAD_GATEWAY ; "upstream")]
    #[test_case(AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR ; "internal")]
    fn status_mapping(error: AppError, expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[test]
    fn internal_errors_share_generic_code() {
        assert_eq!(AppError::Internal("boom".into()).code(), 10000);
        assert_eq!(AppError::Database(sqlx::Error::RowNotFound).code(), 10000);
    }
}
