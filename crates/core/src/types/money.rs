//! Monetary amounts using decimal arithmetic.
//!
//! The store trades in a single currency, so `Money` is just a validated
//! non-negative `Decimal` with two fractional digits. Prices are stored as
//! `NUMERIC(12,2)`.

use core::fmt;
use std::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount exceeds the maximum of {max}")]
    TooLarge { max: Decimal },
    #[error("adjustment would make the price negative ({0})")]
    NegativeResult(Decimal),
}

/// A non-negative amount rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest value `NUMERIC(12,2)` can hold.
    pub const MAX: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

    /// Validate and round an amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] or [`MoneyError::TooLarge`].
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        // Always two fractional digits, so JSON renders `300.00` rather than `300`.
        rounded.rescale(2);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            return Err(MoneyError::Negative);
        }
        if rounded > Self::MAX {
            return Err(MoneyError::TooLarge { max: Self::MAX });
        }
        Ok(Self(rounded.abs()))
    }

    /// Build from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] for negative or oversized values.
    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::new(cents, 2))
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] when the product overflows the column.
    pub fn line_total(&self, quantity: u32) -> Result<Self, MoneyError> {
        let total = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::TooLarge { max: Self::MAX })?;
        Self::new(total)
    }

    /// Apply a bulk price adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::NegativeResult`] if the adjusted price is below
    /// zero; bulk updates abort on the first such product. Returns
    /// [`MoneyError::TooLarge`] when the arithmetic overflows.
    pub fn apply(&self, adjustment: Adjustment) -> Result<Self, MoneyError> {
        let next = match adjustment {
            Adjustment::Percent(pct) => self
                .0
                .checked_mul(pct)
                .and_then(|delta| delta.checked_div(Decimal::ONE_HUNDRED))
                .and_then(|delta| self.0.checked_add(delta)),
            Adjustment::Fixed(delta) => self.0.checked_add(delta),
        }
        .ok_or(MoneyError::TooLarge { max: Self::MAX })?;
        let next = next.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if next.is_sign_negative() && !next.is_zero() {
            return Err(MoneyError::NegativeResult(next));
        }
        Self::new(next)
    }
}

/// A relative or absolute price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    /// `+10` raises by ten percent, `-25` lowers by a quarter.
    Percent(Decimal),
    /// Added to the current price.
    Fixed(Decimal),
}

impl Add for Money {
    type Output = Result<Self, MoneyError>;

    fn add(self, rhs: Self) -> Self::Output {
        let sum = self
            .0
            .checked_add(rhs.0)
            .ok_or(MoneyError::TooLarge { max: Self::MAX })?;
        Self::new(sum)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
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

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_new_rounds_to_cents() {
        assert_eq!(Money::new(dec("10.005")).unwrap().amount(), dec("10.01"));
        assert_eq!(Money::new(dec("10.004")).unwrap().amount(), dec("10.00"));
    }

    #[test]
    fn test_new_rejects_negative_and_huge() {
        assert_eq!(Money::new(dec("-0.01")), Err(MoneyError::Negative));
        assert!(matches!(
            Money::new(dec("10000000000.00")),
            Err(MoneyError::TooLarge { .. })
        ));
        assert!(Money::new(dec("9999999999.99")).is_ok());
    }

    #[test]
    fn test_tiny_negative_rounds_to_zero() {
        assert_eq!(Money::new(dec("-0.001")).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_line_total() {
        let price = Money::new(dec("19.99")).unwrap();
        assert_eq!(price.line_total(3).unwrap().amount(), dec("59.97"));
    }

    #[test]
    fn test_percent_adjustment() {
        let price = Money::new(dec("200.00")).unwrap();
        let up = price.apply(Adjustment::Percent(dec("15"))).unwrap();
        assert_eq!(up.amount(), dec("230.00"));
        let down = price.apply(Adjustment::Percent(dec("-12.5"))).unwrap();
        assert_eq!(down.amount(), dec("175.00"));
    }

    #[test]
    fn test_fixed_adjustment_cannot_go_negative() {
        let price = Money::new(dec("5.00")).unwrap();
        assert_eq!(
            price.apply(Adjustment::Fixed(dec("-6"))),
            Err(MoneyError::NegativeResult(dec("-1.00")))
        );
        assert_eq!(
            price.apply(Adjustment::Fixed(dec("-5"))).unwrap(),
            Money::ZERO
        );
    }

    #[test]
    fn test_huge_adjustments_are_errors_not_panics() {
        let price = Money::from_cents(10_000).unwrap();
        assert!(matches!(
            price.apply(Adjustment::Percent(Decimal::MAX)),
            Err(MoneyError::TooLarge { .. })
        ));
        assert!(matches!(
            price.apply(Adjustment::Fixed(Decimal::MAX)),
            Err(MoneyError::TooLarge { .. })
        ));
        assert!(matches!(
            price.apply(Adjustment::Fixed(Decimal::MIN)),
            Err(MoneyError::NegativeResult(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let money: Money = serde_json::from_str(r#""12.5""#).unwrap();
        assert_eq!(money.to_string(), "12.50");
        assert!(serde_json::from_str::<Money>(r#""-1""#).is_err());
    }

    #[test]
    fn test_adjustment_wire_format() {
        let adj: Adjustment = serde_json::from_str(r#"{"mode":"percent","value":"10"}"#).unwrap();
        assert_eq!(adj, Adjustment::Percent(dec("10")));
        let adj: Adjustment = serde_json::from_str(r#"{"mode":"fixed","value":-3.5}"#).unwrap();
        assert_eq!(adj, Adjustment::Fixed(dec("-3.5")));
    }

    #[test]
    fn test_serializes_with_two_decimals() {
        let json = serde_json::to_string(&Money::new(dec("300")).unwrap()).unwrap();
        assert_eq!(json, r#""300.00""#);
    }

    #[test]
    fn test_display_has_two_decimals() {
        assert_eq!(Money::from_cents(500).unwrap().to_string(), "5.00");
    }
}
