//! Core types for MarketMate.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod rating;

pub use email::{Email, EmailError};
pub use id::ProductId;
pub use price::{Price, PriceBucket};
pub use rating::{Rating, RatingError};
