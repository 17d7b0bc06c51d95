//! Custom Extractors
//!
//! Axum extractors for request headers the handlers care about.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::shared::error::AppError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const MIN_IDEMPOTENCY_KEY_LEN: usize = 8;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Optional `Idempotency-Key` header.
///
/// Keys must be 8 to 128 visible ASCII characters; anything else is a
/// 400 rather than being silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdempotencyKey(pub Option<String>);

impl IdempotencyKey {
    pub fn parse(raw: &str) -> Result<String, AppError> {
        let valid_len = (MIN_IDEMPOTENCY_KEY_LEN..=MAX_IDEMPOTENCY_KEY_LEN).contains(&raw.len());
        if !valid_len || !raw.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(AppError::BadRequest(format!(
                "Idempotency-Key must be {}-{} visible ASCII characters",
                MIN_IDEMPOTENCY_KEY_LEN, MAX_IDEMPOTENCY_KEY_LEN
            )));
        }
        Ok(raw.to_string())
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(IDEMPOTENCY_KEY_HEADER) else {
            return Ok(Self(None));
        };
        let raw = value
            .to_str()
            .map_err(|_| AppError::BadRequest("Idempotency-Key must be ASCII".into()))?;
        Self::parse(raw).map(|key| Self(Some(key)))
    }
}
