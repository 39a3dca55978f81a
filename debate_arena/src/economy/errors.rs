//! Coin economy error types.

use thiserror::Error;

use crate::error::ErrorKind;

/// Coin economy errors
#[derive(Debug, Error, PartialEq)]
pub enum EconomyError {
    /// Reward, consolation and platform percentages add up to more than 100
    #[error("Payout percentages sum to {sum}%, which exceeds 100%")]
    PercentagesExceedTotal { sum: u32 },

    /// Entry fee base must not be negative
    #[error("Invalid entry fee base: {0}")]
    InvalidFeeBase(i64),

    /// Multiplier must be a finite, non-negative number
    #[error("Invalid entry fee multiplier: {0}")]
    InvalidMultiplier(f64),

    /// Entry fee does not fit in a coin amount
    #[error("Entry fee overflows the coin range")]
    FeeOverflow,

    /// Pool amounts are never negative
    #[error("Invalid pool amount: {0}")]
    NegativePool(i64),

    /// Tier costs must be non-negative
    #[error("Invalid tournament belt cost: {0}")]
    InvalidBeltCost(i64),
}

impl EconomyError {
    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            EconomyError::NegativePool(_) => ErrorKind::Validation,
            _ => ErrorKind::Configuration,
        }
    }
}

/// Result type for economy calculations
pub type EconomyResult<T> = Result<T, EconomyError>;
