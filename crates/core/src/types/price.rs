//! Type-safe price representation using decimal arithmetic.
//!
//! All store prices are euros. The backend transmits them as JSON floats,
//! so they are normalised to whole cents on the way in and every sum after
//! that is exact.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative euro amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount, rounded to cents.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp(2))
    }

    /// Create a price from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Convert a wire float into a price.
    ///
    /// Returns `None` for NaN, infinities and negative values.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Decimal::try_from(value).ok().map(Self::new)
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}€", self.0)
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

/// Fixed price ranges offered as store facets.
///
/// Upper bounds are inclusive, so every price lands in exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceBucket {
    UpTo5,
    UpTo10,
    UpTo20,
    UpTo50,
    UpTo100,
    UpTo200,
    Over200,
}

impl PriceBucket {
    /// Buckets in display order.
    pub const ALL: [Self; 7] = [
        Self::UpTo5,
        Self::UpTo10,
        Self::UpTo20,
        Self::UpTo50,
        Self::UpTo100,
        Self::UpTo200,
        Self::Over200,
    ];

    /// Inclusive upper bound in whole euros, `None` for the open-ended bucket.
    #[must_use]
    pub const fn upper_bound(self) -> Option<i64> {
        match self {
            Self::UpTo5 => Some(5),
            Self::UpTo10 => Some(10),
            Self::UpTo20 => Some(20),
            Self::UpTo50 => Some(50),
            Self::UpTo100 => Some(100),
            Self::UpTo200 => Some(200),
            Self::Over200 => None,
        }
    }

    /// Exclusive lower bound in whole euros, `None` for the first bucket.
    #[must_use]
    pub const fn lower_bound(self) -> Option<i64> {
        match self {
            Self::UpTo5 => None,
            Self::UpTo10 => Some(5),
            Self::UpTo20 => Some(10),
            Self::UpTo50 => Some(20),
            Self::UpTo100 => Some(50),
            Self::UpTo200 => Some(100),
            Self::Over200 => Some(200),
        }
    }

    /// The bucket a price belongs to.
    #[must_use]
    pub fn for_price(price: Price) -> Self {
        Self::ALL
            .into_iter()
            .find(|bucket| {
                bucket
                    .upper_bound()
                    .is_some_and(|upper| price.amount() <= Decimal::from(upper))
            })
            .unwrap_or(Self::Over200)
    }

    #[must_use]
    pub fn contains(self, price: Price) -> bool {
        Self::for_price(price) == self
    }

    /// Human-readable label, e.g. `5€ - 10€`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UpTo5 => "0€ - 5€",
            Self::UpTo10 => "5€ - 10€",
            Self::UpTo20 => "10€ - 20€",
            Self::UpTo50 => "20€ - 50€",
            Self::UpTo100 => "50€ - 100€",
            Self::UpTo200 => "100€ - 200€",
            Self::Over200 => "200€+",
        }
    }

    /// Stable identifier used in query strings.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::UpTo5 => "0-5",
            Self::UpTo10 => "5-10",
            Self::UpTo20 => "10-20",
            Self::UpTo50 => "20-50",
            Self::UpTo100 => "50-100",
            Self::UpTo200 => "100-200",
            Self::Over200 => "200-plus",
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.slug() == slug)
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_two_decimals_with_euro_suffix() {
        assert_eq!(Price::from_cents(1250).to_string(), "12.50€");
        assert_eq!(Price::ZERO.to_string(), "0.00€");
    }

    #[test]
    fn test_from_f64_normalises_to_cents() {
        assert_eq!(Price::from_f64(19.99).unwrap(), Price::from_cents(1999));
        assert_eq!(Price::from_f64(3.0).unwrap(), Price::from_cents(300));
    }

    #[test]
    fn test_from_f64_rejects_invalid() {
        assert!(Price::from_f64(-1.0).is_none());
        assert!(Price::from_f64(f64::NAN).is_none());
        assert!(Price::from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn test_sum_and_multiply() {
        let total: Price = [Price::from_cents(250) * 3, Price::from_cents(1)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(751));
    }

    #[test]
    fn test_bucket_boundaries_are_inclusive_upper() {
        assert_eq!(PriceBucket::for_price(Price::from_cents(0)), PriceBucket::UpTo5);
        assert_eq!(PriceBucket::for_price(Price::from_cents(500)), PriceBucket::UpTo5);
        assert_eq!(PriceBucket::for_price(Price::from_cents(501)), PriceBucket::UpTo10);
        assert_eq!(PriceBucket::for_price(Price::from_cents(2000)), PriceBucket::UpTo20);
        assert_eq!(PriceBucket::for_price(Price::from_cents(20000)), PriceBucket::UpTo200);
        assert_eq!(PriceBucket::for_price(Price::from_cents(20001)), PriceBucket::Over200);
    }

    #[test]
    fn test_every_price_falls_in_exactly_one_bucket() {
        for cents in (0..30_000).step_by(7) {
            let price = Price::from_cents(cents);
            let matching = PriceBucket::ALL
                .into_iter()
                .filter(|bucket| bucket.contains(price))
                .count();
            assert_eq!(matching, 1, "price {price} matched {matching} buckets");
        }
    }

    #[test]
    fn test_bounds_agree_with_classification() {
        for bucket in PriceBucket::ALL {
            if let Some(upper) = bucket.upper_bound() {
                assert_eq!(PriceBucket::for_price(Price::from_cents(upper * 100)), bucket);
            }
            if let Some(lower) = bucket.lower_bound() {
                assert_ne!(PriceBucket::for_price(Price::from_cents(lower * 100)), bucket);
                assert_eq!(PriceBucket::for_price(Price::from_cents(lower * 100 + 1)), bucket);
            }
        }
    }

    #[test]
    fn test_slug_round_trip() {
        for bucket in PriceBucket::ALL {
            assert_eq!(PriceBucket::from_slug(bucket.slug()), Some(bucket));
        }
        assert_eq!(PriceBucket::from_slug("cheap"), None);
    }
}
