//! Exact decimal money.
//!
//! Prices and order totals are `rust_decimal::Decimal` values with two
//! fractional digits. Floating point never touches currency: a total computed
//! over any number of lines is exactly the sum of its line totals.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::line::Quantity;

/// Number of fractional digits stored for currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Errors that can occur when constructing or combining a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices cannot be negative.
    #[error("price cannot be negative")]
    Negative,
    /// More fractional digits than the currency supports.
    #[error("price must have at most {CURRENCY_SCALE} decimal places")]
    TooPrecise,
    /// Arithmetic overflowed the decimal range.
    #[error("price arithmetic overflowed")]
    Overflow,
}

/// A non-negative currency amount with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// Trailing zeros beyond the currency scale are accepted (`1.500` is
    /// `1.50`); significant extra digits are not.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero and
    /// [`PriceError::TooPrecise`] for amounts with more than two significant
    /// decimal places.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let normalized = amount.normalize();
        if normalized.scale() > CURRENCY_SCALE {
            return Err(PriceError::TooPrecise);
        }
        let mut value = normalized;
        value.rescale(CURRENCY_SCALE);
        Ok(Self(value))
    }

    /// Create a price from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative input.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, CURRENCY_SCALE))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Total for `quantity` units at this price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the product does not fit.
    pub fn line_total(self, quantity: Quantity) -> Result<Self, PriceError> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .map(Self)
            .ok_or(PriceError::Overflow)
    }

    /// Add two prices.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the sum does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, PriceError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(PriceError::Overflow)
    }

    /// Sum a sequence of prices, failing on overflow.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the running total does not fit.
    pub fn try_sum<I>(prices: I) -> Result<Self, PriceError>
    where
        I: IntoIterator<Item = Self>,
    {
        prices
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Sum for Price {
    /// Saturating sum for display purposes; use [`Price::try_sum`] where
    /// overflow must be reported.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| {
            acc.checked_add(p).unwrap_or(Self(Decimal::MAX))
        })
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn price(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn test_rejects_negative() {
        assert_eq!(
            Price::new(Decimal::from_str("-0.01").unwrap()),
            Err(PriceError::Negative)
        );
    }

    #[test]
    fn test_rejects_sub_cent_precision() {
        assert_eq!(
            Price::new(Decimal::from_str("1.005").unwrap()),
            Err(PriceError::TooPrecise)
        );
    }

    #[test]
    fn test_accepts_trailing_zeros() {
        assert_eq!(price("1.500"), price("1.5"));
        assert_eq!(price("1.5").to_string(), "1.50");
    }

    #[test]
    fn test_line_total_is_exact() {
        let unit = price("0.10");
        let total = unit.line_total(Quantity::new(3).unwrap()).unwrap();
        assert_eq!(total, price("0.30"));
    }

    #[test]
    fn test_sum_has_no_rounding_drift() {
        // 0.1 + 0.2 style accumulation over many lines stays exact.
        let lines = std::iter::repeat_n(price("0.10"), 1000);
        assert_eq!(Price::try_sum(lines).unwrap(), price("100.00"));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&price("19.90")).unwrap();
        assert_eq!(json, "\"19.90\"");
        let parsed: Price = serde_json::from_str("\"19.9\"").unwrap();
        assert_eq!(parsed, price("19.90"));
    }

    #[test]
    fn test_serde_rejects_negative() {
        assert!(serde_json::from_str::<Price>("\"-1\"").is_err());
    }

    #[test]
    fn test_amount_maps_optional_bounds() {
        let bound = Some(price("12.5"));
        assert_eq!(
            bound.map(Price::amount),
            Some(Decimal::from_str("12.50").unwrap())
        );
        assert_eq!(None::<Price>.map(Price::amount), None);
    }

    #[test]
    fn test_from_cents() {
        assert_eq!(Price::from_cents(1999).unwrap(), price("19.99"));
    }
}
