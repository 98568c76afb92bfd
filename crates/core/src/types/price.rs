//! Type-safe price representation using decimal arithmetic.
//!
//! The product service stores prices as `DECIMAL(8, 2)` and serializes them
//! as strings (`"19.99"`), so the wire form round-trips through
//! `rust_decimal` without floating point loss.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a decimal number")]
    Invalid,
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// More than two fractional digits.
    #[error("price must have at most {max} decimal places")]
    TooPrecise {
        /// Maximum allowed decimal places.
        max: u32,
    },
    /// More digits than the server column accepts.
    #[error("price must have at most {max} digits")]
    TooLarge {
        /// Maximum allowed total digits.
        max: u32,
    },
}

/// A product price in the shop's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Maximum decimal places accepted by the server.
    pub const MAX_SCALE: u32 = 2;
    /// Maximum total digits accepted by the server.
    pub const MAX_DIGITS: u32 = 8;

    /// Validate a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative, has more than two decimal
    /// places, or has more than eight digits in total.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }

        let normalized = amount.normalize();
        if normalized.scale() > Self::MAX_SCALE {
            return Err(PriceError::TooPrecise {
                max: Self::MAX_SCALE,
            });
        }

        let integer_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len();
        let integer_digits = u32::try_from(integer_digits).unwrap_or(u32::MAX);
        if integer_digits + Self::MAX_SCALE > Self::MAX_DIGITS {
            return Err(PriceError::TooLarge {
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| PriceError::Invalid)?;
        Self::new(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_prices() {
        assert_eq!("19.99".parse::<Price>().unwrap().to_string(), "19.99");
        assert_eq!("5".parse::<Price>().unwrap().to_string(), "5.00");
        assert_eq!("0".parse::<Price>().unwrap().to_string(), "0.00");
        assert!("999999.99".parse::<Price>().is_ok());
    }

    #[test]
    fn test_parse_invalid_prices() {
        assert_eq!("abc".parse::<Price>(), Err(PriceError::Invalid));
        assert_eq!("-1".parse::<Price>(), Err(PriceError::Negative));
        assert_eq!(
            "1.999".parse::<Price>(),
            Err(PriceError::TooPrecise { max: 2 })
        );
        assert_eq!(
            "1000000".parse::<Price>(),
            Err(PriceError::TooLarge { max: 8 })
        );
    }

    #[test]
    fn test_price_serializes_as_string() {
        let price: Price = serde_json::from_str("\"24.50\"").unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"24.50\"");
    }
}
