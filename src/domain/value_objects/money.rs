//! Money value object.
//!
//! Amounts are kept in minor units (cents) so that prices never pass
//! through floating point.

use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// An amount in minor units plus a lowercase ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into().to_lowercase(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Scale by an integer percentage, rounding half-up to the minor unit.
    pub fn percent(&self, percent: i64) -> Result<Money, AppError> {
        let rounded = self
            .amount
            .checked_mul(percent)
            .and_then(|scaled| {
                if scaled >= 0 {
                    scaled.checked_add(50)
                } else {
                    scaled.checked_sub(50)
                }
            })
            .map(|scaled| scaled / 100)
            .ok_or_else(|| AppError::Internal("Money overflow".into()))?;
        Ok(Money::new(rounded, self.currency.clone()))
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, AppError> {
        if self.currency != other.currency {
            return Err(AppError::Internal(format!(
                "Currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| AppError::Internal("Money overflow".into()))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Human readable form used in emails, e.g. `12.50 USD`.
    pub fn display(&self) -> String {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!(
            "{}{}.{:02} {}",
            sign,
            abs / 100,
            abs % 100,
            self.currency.to_uppercase()
        )
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}
