//! Amount type
//!
//! Transfer amounts in minor currency units (cents). Validated at construction
//! so a non-positive transfer can never reach a transaction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest single transfer accepted (one trillion minor units)
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// A strictly positive amount of minor currency units.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Value never exceeds `MAX_AMOUNT`, so negating it cannot overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(i64),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,
}

impl Amount {
    /// Create a new Amount with validation.
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(value));
        }
        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }
        Ok(Self(value))
    }

    /// Value as a credit delta.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Value as a debit delta.
    pub fn negated(&self) -> i64 {
        -self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(100).unwrap();
        assert_eq!(amount.value(), 100);
        assert_eq!(amount.negated(), -100);
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert_eq!(Amount::new(0), Err(AmountError::NotPositive(0)));
    }

    #[test]
    fn test_amount_negative_rejected() {
        assert_eq!(Amount::new(-5), Err(AmountError::NotPositive(-5)));
    }

    #[test]
    fn test_amount_overflow() {
        assert_eq!(Amount::new(MAX_AMOUNT + 1), Err(AmountError::Overflow));
        assert!(Amount::new(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_amount_deserialize_validates() {
        let ok: Amount = serde_json::from_str("250").unwrap();
        assert_eq!(ok.value(), 250);

        let err = serde_json::from_str::<Amount>("0");
        assert!(err.is_err());
    }
}
