//! # Money
//!
//! Prices and totals as integer cents.
//!
//! ## Cart Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  catalog "price": 2.5 ──► from_decimal ──► Money(250)  half away from 0 │
//! │                                                                         │
//! │  line_total = unit_price.times(quantity)      exact, saturating         │
//! │  total      = lines.map(line_total).sum()     exact                     │
//! │  savings    = (original - unit).times(qty)    floored at $0.00          │
//! │                                                                         │
//! │  The badge total always equals the sum of the rows the shopper sees.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use storefront_core::money::Money;
//!
//! let apples = Money::from_cents(250);
//! assert_eq!(apples.times(3).to_string(), "$7.50");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

/// An amount in cents.
///
/// Serialized as a bare integer of cents, so a snapshot line reads
/// `"unitPrice": 250`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Converts a decimal amount in major units (`12.99`) to cents.
    ///
    /// Sub-cent digits round half away from zero. `None` when the amount
    /// does not fit in `i64` cents.
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Money)
    }

    /// The amount in major units, exact.
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Floors negative amounts at zero.
    ///
    /// Catalog prices are expected to be non-negative; anything below zero
    /// is malformed and enters the cart as free.
    #[inline]
    pub const fn non_negative(self) -> Self {
        if self.0 < 0 {
            Self::ZERO
        } else {
            self
        }
    }

    /// Price of `quantity` units.
    ///
    /// Quantities are unbounded, so this saturates instead of overflowing.
    #[inline]
    pub const fn times(self, quantity: u32) -> Self {
        Money(self.0.saturating_mul(quantity as i64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(250).to_string(), "$2.50");
        assert_eq!(Money::from_cents(1500).to_string(), "$15.00");
        assert_eq!(Money::from_cents(7).to_string(), "$0.07");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_times() {
        assert_eq!(Money::from_cents(250).times(2).cents(), 500);
        assert_eq!(Money::from_cents(1500).times(0), Money::ZERO);
        assert_eq!(Money::from_cents(i64::MAX / 2).times(3).cents(), i64::MAX);
    }

    #[test]
    fn test_add_sub() {
        let mut subtotal = Money::from_cents(500);
        subtotal += Money::from_cents(1500);
        assert_eq!(subtotal.cents(), 2000);
        assert_eq!((subtotal - Money::from_cents(300)).cents(), 1700);
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = vec![Money::from_cents(500), Money::from_cents(1500)];
        let by_ref: Money = lines.iter().sum();
        let by_value: Money = lines.into_iter().sum();
        assert_eq!(by_ref.cents(), 2000);
        assert_eq!(by_value, by_ref);
        assert!(Vec::<Money>::new().iter().sum::<Money>().is_zero());
    }

    #[test]
    fn test_from_decimal() {
        let cents = |s: &str| Money::from_decimal(s.parse().unwrap()).map(|m| m.cents());
        assert_eq!(cents("12.99"), Some(1299));
        assert_eq!(cents("2.5"), Some(250));
        assert_eq!(cents("3"), Some(300));
        assert_eq!(cents("0.005"), Some(1));
        assert_eq!(cents("-0.005"), Some(-1));
        assert_eq!(cents("79228162514264337593543950335"), None);
        assert_eq!(Money::from_cents(1299).to_decimal().to_string(), "12.99");
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(Money::from_cents(-1).non_negative(), Money::ZERO);
        assert_eq!(Money::from_cents(42).non_negative().cents(), 42);
    }

    #[test]
    fn test_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Money::from_cents(250)).unwrap(), "250");
        let back: Money = serde_json::from_str("250").unwrap();
        assert_eq!(back, Money::from_cents(250));
    }
}
