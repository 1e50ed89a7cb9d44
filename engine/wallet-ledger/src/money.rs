//! Money type for wallet arithmetic in minor currency units

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Money represents a signed amount in cents
///
/// Serialized as a bare integer count of cents. Credits are positive and
/// debits negative when used as a ledger delta.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    /// Create an amount from cents
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Create an amount from whole dollars
    pub const fn from_dollars(dollars: i64) -> Self {
        Self { cents: dollars * 100 }
    }

    /// Get the value in cents
    pub const fn cents(self) -> i64 {
        self.cents
    }

    /// Get the value as a decimal number of dollars
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Create from a decimal dollar amount, flooring to the cent
    pub fn from_decimal_floor(dollars: Decimal) -> Self {
        let cents = (dollars * Decimal::ONE_HUNDRED).floor().to_i64().unwrap_or(0);
        Self { cents }
    }

    /// Create from a decimal dollar amount, rounding half away from zero
    pub fn from_decimal_rounded(dollars: Decimal) -> Self {
        let cents = (dollars * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0);
        Self { cents }
    }

    pub fn is_zero(self) -> bool {
        self.cents == 0
    }

    pub fn is_positive(self) -> bool {
        self.cents > 0
    }

    pub fn is_negative(self) -> bool {
        self.cents < 0
    }

    pub fn abs(self) -> Self {
        Self { cents: self.cents.abs() }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Addition that reports overflow instead of wrapping
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.cents.checked_add(other.cents).map(Self::from_cents)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self { cents: self.cents + other.cents }
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.cents += other.cents;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self { cents: self.cents - other.cents }
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.cents -= other.cents;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self { cents: -self.cents }
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, amount| acc + amount)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_negative() {
            write!(f, "-${:.2}", self.abs().to_decimal())
        } else {
            write!(f, "${:.2}", self.to_decimal())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_money_creation() {
        let money = Money::from_dollars(25);
        assert_eq!(money.cents(), 2500);
        assert_eq!(money.to_decimal(), Decimal::from_str("25.00").unwrap());
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1260);
        let b = Money::from_cents(540);

        assert_eq!(a + b, Money::from_dollars(18));
        assert_eq!(a - b, Money::from_cents(720));
        assert_eq!(-a, Money::from_cents(-1260));
        assert_eq!([a, b].iter().sum::<Money>(), Money::from_dollars(18));
    }

    #[test]
    fn test_decimal_conversion_floors() {
        let amount = Decimal::from_str("12.609").unwrap();
        assert_eq!(Money::from_decimal_floor(amount), Money::from_cents(1260));

        let amount = Decimal::from_str("0.515").unwrap();
        assert_eq!(Money::from_decimal_rounded(amount), Money::from_cents(52));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1260).to_string(), "$12.60");
        assert_eq!(Money::from_cents(-200).to_string(), "-$2.00");
    }

    #[test]
    fn test_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(4250)).unwrap();
        assert_eq!(json, "4250");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_cents(4250));
    }
}
