//! Type-safe price representation using decimal arithmetic.
//!
//! All storefront prices are in Brazilian reais (BRL). Amounts are kept as
//! [`Decimal`] so cart totals never suffer float rounding drift.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price in BRL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount in reais.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in centavos.
    ///
    /// ```
    /// use quantofy_core::Price;
    ///
    /// assert_eq!(Price::from_cents(14990).to_string(), "R$ 149,90");
    /// ```
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The amount in reais.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this price is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    /// Formats as Brazilian currency, e.g. `R$ 1.234,50`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let text = format!("{:.2}", rounded.abs());
        let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, digit) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(digit);
        }

        write!(f, "R$ {sign}{grouped},{cents}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_brazilian_format() {
        assert_eq!(Price::from_cents(14990).to_string(), "R$ 149,90");
        assert_eq!(Price::from_cents(123_450).to_string(), "R$ 1.234,50");
        assert_eq!(Price::from_cents(100_000_000).to_string(), "R$ 1.000.000,00");
        assert_eq!(Price::ZERO.to_string(), "R$ 0,00");
    }

    #[test]
    fn test_multiply_by_quantity() {
        assert_eq!(Price::from_cents(29990) * 3, Price::from_cents(89970));
    }

    #[test]
    fn test_sum() {
        let total: Price = [Price::from_cents(14990), Price::from_cents(19990)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(34980));
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        let total: Price = core::iter::empty().sum();
        assert!(total.is_zero());
    }
}
