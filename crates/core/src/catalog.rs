//! Product catalog entities.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::{Price, PriceBucket, ProductId, Rating};

/// A purchasable item as served by the backend catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Price,
    pub image_url: String,
    pub is_alcohol: bool,
    /// Reviews in the order the backend stored them (oldest first).
    pub reviews: Vec<Review>,
}

/// A customer's rating and comment on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub rating: Rating,
    pub comment: String,
}

impl Product {
    #[must_use]
    pub fn price_bucket(&self) -> PriceBucket {
        PriceBucket::for_price(self.price)
    }

    /// Mean review rating, see [`average_rating`].
    #[must_use]
    pub fn average_rating(&self) -> Decimal {
        average_rating(&self.reviews)
    }

    /// The review written by `username`, if any.
    #[must_use]
    pub fn review_by(&self, username: &str) -> Option<&Review> {
        self.reviews.iter().find(|review| review.author == username)
    }

    /// Reviews for display, most recent first.
    pub fn reviews_newest_first(&self) -> impl Iterator<Item = &Review> {
        self.reviews.iter().rev()
    }

    /// Case-insensitive substring match on the product name.
    #[must_use]
    pub fn name_matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Arithmetic mean of the ratings, rounded half away from zero to one decimal.
///
/// Returns zero when there are no reviews. The result always carries one
/// decimal place, so it displays as `4.0` rather than `4`.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> Decimal {
    let mut average = if reviews.is_empty() {
        Decimal::ZERO
    } else {
        let total: u32 = reviews.iter().map(|review| u32::from(review.rating.get())).sum();
        let count = u32::try_from(reviews.len()).unwrap_or(u32::MAX);
        (Decimal::from(total) / Decimal::from(count))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    };
    average.rescale(1);
    average
}

/// Look up a product by id.
#[must_use]
pub fn find_product(catalog: &[Product], id: ProductId) -> Option<&Product> {
    catalog.iter().find(|product| product.id == id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: i64, name: &str, category: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: format!("{name} description"),
            category: category.to_string(),
            price: Price::from_cents(cents),
            image_url: format!("https://img.example/{id}.png"),
            is_alcohol: false,
            reviews: Vec::new(),
        }
    }

    pub fn review(author: &str, rating: i64) -> Review {
        Review {
            author: author.to_string(),
            rating: Rating::new(rating).unwrap(),
            comment: format!("{author} says hi"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::{product, review};
    use super::*;

    #[test]
    fn test_average_of_five_three_four_is_four() {
        let reviews = vec![review("a", 5), review("b", 3), review("c", 4)];
        assert_eq!(average_rating(&reviews).to_string(), "4.0");
    }

    #[test]
    fn test_average_without_reviews_is_zero() {
        assert_eq!(average_rating(&[]).to_string(), "0.0");
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        // 14 / 3 = 4.666..
        let reviews = vec![review("a", 5), review("b", 5), review("c", 4)];
        assert_eq!(average_rating(&reviews).to_string(), "4.7");
        // 9 / 4 = 2.25 rounds away from zero
        let reviews = vec![review("a", 1), review("b", 2), review("c", 3), review("d", 3)];
        assert_eq!(average_rating(&reviews).to_string(), "2.3");
    }

    #[test]
    fn test_review_by_matches_exact_author() {
        let mut p = product(1, "Olive Oil", "Pantry", 899);
        p.reviews = vec![review("ana", 4), review("bob", 2)];
        assert_eq!(p.review_by("bob").unwrap().rating.get(), 2);
        assert!(p.review_by("Bob").is_none());
    }

    #[test]
    fn test_reviews_newest_first() {
        let mut p = product(1, "Olive Oil", "Pantry", 899);
        p.reviews = vec![review("first", 4), review("second", 2)];
        let authors: Vec<_> = p.reviews_newest_first().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, vec!["second", "first"]);
    }

    #[test]
    fn test_name_matches_case_insensitively() {
        let p = product(1, "Red Wine", "Drinks", 1200);
        assert!(p.name_matches("wINe"));
        assert!(!p.name_matches("beer"));
    }

    #[test]
    fn test_find_product() {
        let catalog = vec![product(1, "A", "x", 100), product(2, "B", "x", 100)];
        assert_eq!(find_product(&catalog, ProductId::new(2)).unwrap().name, "B");
        assert!(find_product(&catalog, ProductId::new(3)).is_none());
    }
}
