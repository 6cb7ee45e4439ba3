//! Storefront-side models.
//!
//! Domain entities live in `marketmate_core`; this module holds the values
//! the storefront keeps per visitor in the session.

pub mod session;

pub use session::{CurrentUser, Flash, FlashKind};
