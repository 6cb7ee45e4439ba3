//! MarketMate Core - Domain types and catalog logic.
//!
//! This crate provides the types and pure list operations shared by the
//! `storefront` crate:
//! - product catalog entities and review statistics
//! - store filtering, sorting, pagination and search
//! - basket arithmetic and shipping policy
//! - age verification and review gating
//! - checkout and registration form validation
//!
//! # Architecture
//!
//! The core crate contains only types and functions - no I/O, no HTTP
//! clients, no clocks. Callers pass "today" and the catalog explicitly,
//! which keeps every rule testable in isolation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod age;
pub mod basket;
pub mod catalog;
pub mod checkout;
pub mod review;
pub mod store;
pub mod types;

pub use account::{Credentials, CredentialsError, Registration};
pub use age::{AgeGate, BirthDate, BirthDateError};
pub use basket::{Basket, BasketLine, BasketTotals, ShippingPolicy};
pub use catalog::{Product, Review, average_rating, find_product};
pub use checkout::{CheckoutError, CheckoutForm, ShippingAddress};
pub use review::{ReviewEligibility, ReviewError, ReviewSubmission};
pub use store::{EmptyState, Listing, SortDirection, SortKey, SortState, StoreFilter, StoreQuery};
pub use types::*;
