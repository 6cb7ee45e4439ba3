//! Age verification for alcohol-flagged products.
//!
//! A visitor's decision is recorded once per session as an [`AgeGate`].
//! Until an adult birth date is supplied, alcohol-flagged products are
//! hidden everywhere they would otherwise be listed.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;

/// Minimum age, in whole years, for alcohol-flagged products.
pub const ADULT_AGE: i32 = 18;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BirthDateError {
    #[error("birth date must be written as DD-MM-YYYY")]
    Format,
    #[error("{0} is not a valid calendar date")]
    InvalidDate(String),
    #[error("birth date cannot be in the future")]
    InFuture,
}

/// A date of birth entered as `DD-MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthDate(NaiveDate);

impl BirthDate {
    /// Parse `DD-MM-YYYY`. Single-digit day and month are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`BirthDateError::Format`] when the shape is wrong and
    /// [`BirthDateError::InvalidDate`] for dates such as `31-02-2000`.
    pub fn parse(input: &str) -> Result<Self, BirthDateError> {
        let trimmed = input.trim();
        let mut parts = trimmed.split('-');
        let (Some(day), Some(month), Some(year), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(BirthDateError::Format);
        };

        let numeric = |s: &str, min: usize, max: usize| {
            (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
        };
        if !numeric(day, 1, 2) || !numeric(month, 1, 2) || !numeric(year, 4, 4) {
            return Err(BirthDateError::Format);
        }

        let (Ok(day), Ok(month), Ok(year)) = (day.parse(), month.parse(), year.parse()) else {
            return Err(BirthDateError::Format);
        };
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| BirthDateError::InvalidDate(trimmed.to_string()))
    }

    #[must_use]
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Completed years on `today`.
    ///
    /// The year difference, minus one when today's month/day falls before
    /// the birthday. Negative for dates after `today`.
    #[must_use]
    pub fn age_on(self, today: NaiveDate) -> i32 {
        let years = today.year() - self.0.year();
        if (today.month(), today.day()) < (self.0.month(), self.0.day()) {
            years - 1
        } else {
            years
        }
    }
}

/// Session-scoped age verification state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeGate {
    #[default]
    Undecided,
    Adult,
    Underage,
}

impl AgeGate {
    /// Decide the gate from a birth date.
    ///
    /// # Errors
    ///
    /// Returns [`BirthDateError::InFuture`] for birth dates after `today`.
    pub fn from_birth_date(birth: BirthDate, today: NaiveDate) -> Result<Self, BirthDateError> {
        if birth.0 > today {
            return Err(BirthDateError::InFuture);
        }
        Ok(if birth.age_on(today) >= ADULT_AGE {
            Self::Adult
        } else {
            Self::Underage
        })
    }

    #[must_use]
    pub const fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }

    #[must_use]
    pub const fn allows_alcohol(self) -> bool {
        matches!(self, Self::Adult)
    }

    /// Whether `product` may be shown under this gate.
    #[must_use]
    pub const fn permits(self, product: &Product) -> bool {
        !product.is_alcohol || self.allows_alcohol()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::product;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_exactly_eighteen_today_is_adult() {
        let today = date(2026, 10, 16);
        let birth = BirthDate::parse("16-10-2008").unwrap();
        assert_eq!(birth.age_on(today), 18);
        assert_eq!(AgeGate::from_birth_date(birth, today), Ok(AgeGate::Adult));
    }

    #[test]
    fn test_one_day_short_is_underage() {
        let today = date(2026, 10, 16);
        let birth = BirthDate::parse("17-10-2008").unwrap();
        assert_eq!(birth.age_on(today), 17);
        assert_eq!(AgeGate::from_birth_date(birth, today), Ok(AgeGate::Underage));
    }

    #[test]
    fn test_earlier_month_counts_full_year() {
        let birth = BirthDate::parse("1-2-1990").unwrap();
        assert_eq!(birth.age_on(date(2026, 10, 16)), 36);
    }

    #[test]
    fn test_leap_day_birthday() {
        let birth = BirthDate::parse("29-02-2008").unwrap();
        assert_eq!(birth.age_on(date(2026, 2, 28)), 17);
        assert_eq!(birth.age_on(date(2026, 3, 1)), 18);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert_eq!(BirthDate::parse("2008-10-16"), Err(BirthDateError::Format));
        assert_eq!(BirthDate::parse("16/10/2008"), Err(BirthDateError::Format));
        assert_eq!(BirthDate::parse("16-10"), Err(BirthDateError::Format));
        assert_eq!(BirthDate::parse("aa-bb-cccc"), Err(BirthDateError::Format));
        assert_eq!(BirthDate::parse("1-1-2000-1"), Err(BirthDateError::Format));
    }

    #[test]
    fn test_parse_rejects_impossible_dates() {
        assert!(matches!(
            BirthDate::parse("31-02-2000"),
            Err(BirthDateError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let birth = BirthDate::parse("01-01-2030").unwrap();
        assert_eq!(
            AgeGate::from_birth_date(birth, date(2026, 10, 16)),
            Err(BirthDateError::InFuture)
        );
    }

    #[test]
    fn test_gate_permits() {
        let mut wine = product(1, "Wine", "Drinks", 1500);
        wine.is_alcohol = true;
        let bread = product(2, "Bread", "Bakery", 250);

        assert!(!AgeGate::Undecided.permits(&wine));
        assert!(!AgeGate::Underage.permits(&wine));
        assert!(AgeGate::Adult.permits(&wine));
        assert!(AgeGate::Underage.permits(&bread));
        assert!(AgeGate::Undecided.permits(&bread));
    }
}
