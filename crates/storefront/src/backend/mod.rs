//! `MarketMate` REST backend client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for catalog, basket, favorites and
//!   purchases; the storefront holds only per-session copies
//! - Plain JSON over `reqwest`, bearer token for `/api/me/*` and review writes
//! - Catalog and single products cached in-process via `moka`
//!
//! # Example
//!
//! ```rust,ignore
//! use marketmate_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend)?;
//! let catalog = client.all_products().await?;
//! let token = client.login(&credentials).await?;
//! client.sync_basket(&token, &basket).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::BackendClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing, expired or rejected bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The backend refused the request (4xx/5xx, or a 2xx body carrying `error`).
    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A response that parsed but does not make sense.
    #[error("Invalid response: {0}")]
    Invalid(String),
}

impl BackendError {
    /// Message from the backend that is safe to show the visitor, if any.
    ///
    /// Only validation-style rejections carry one (e.g. "Email already exists").
    #[must_use]
    pub fn visitor_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { status, message } if (400..500).contains(status) => {
                Some(message.as_str())
            }
            Self::Unauthorized(message) if !message.is_empty() => Some(message.as_str()),
            _ => None,
        }
    }
}
