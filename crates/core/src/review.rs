//! Review gating and submission validation.

use crate::catalog::{Product, Review};
use crate::types::{ProductId, Rating, RatingError};

/// Maximum review comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Whether a visitor may write a new review for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEligibility {
    /// Anonymous, or the product is not among the visitor's purchases.
    NotPurchased,
    AlreadyReviewed,
    Eligible,
}

impl ReviewEligibility {
    /// Evaluate eligibility for `username` given their purchased product ids.
    #[must_use]
    pub fn evaluate(product: &Product, username: Option<&str>, purchased: &[ProductId]) -> Self {
        let Some(username) = username else {
            return Self::NotPurchased;
        };
        if !purchased.contains(&product.id) {
            Self::NotPurchased
        } else if product.review_by(username).is_some() {
            Self::AlreadyReviewed
        } else {
            Self::Eligible
        }
    }

    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }

    /// Notice shown in place of the review form.
    #[must_use]
    pub const fn notice(self) -> Option<&'static str> {
        match self {
            Self::NotPurchased => Some("You need to buy this product to tell us your opinion!"),
            Self::AlreadyReviewed => Some("You have already reviewed this product."),
            Self::Eligible => None,
        }
    }
}

/// Only the author may edit or delete a review.
#[must_use]
pub fn can_manage(review: &Review, username: Option<&str>) -> bool {
    username.is_some_and(|name| review.author == name)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Please select a rating between 1 and 5 stars.")]
    MissingRating,
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error("Your comment exceeds the 500 character limit.")]
    CommentTooLong,
}

/// A validated rating and comment, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSubmission {
    pub rating: Rating,
    pub comment: String,
}

impl ReviewSubmission {
    /// Validate raw form input.
    ///
    /// The comment is trimmed and may be empty; a rating is required.
    ///
    /// # Errors
    ///
    /// Returns a [`ReviewError`] when the rating is missing or out of range,
    /// or the comment is over [`MAX_COMMENT_CHARS`].
    pub fn parse(rating: Option<i64>, comment: &str) -> Result<Self, ReviewError> {
        let rating = Rating::new(rating.ok_or(ReviewError::MissingRating)?)?;
        let comment = comment.trim();
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(ReviewError::CommentTooLong);
        }
        Ok(Self {
            rating,
            comment: comment.to_string(),
        })
    }
}
