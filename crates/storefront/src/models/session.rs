//! Session-related types.
//!
//! Per-visitor state is keyed here: identity and token, the age gate, the
//! local basket copy, the free-shipping latch and one pending notification.

use marketmate_core::{AgeGate, Basket};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::backend::{BearerToken, UserInfo};

/// Session-stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Bearer token for `/api/me/*` calls.
    pub token: BearerToken,
    pub username: String,
    pub email: Option<String>,
    /// Avatar file name as served by `/avatars/{file}`.
    pub avatar: String,
}

impl CurrentUser {
    #[must_use]
    pub fn from_info(token: BearerToken, info: &UserInfo) -> Self {
        Self {
            token,
            username: info.username.clone(),
            email: info.email.clone(),
            avatar: info.avatar_file().to_string(),
        }
    }

    #[must_use]
    pub fn avatar_url(&self) -> String {
        avatar_url(&self.avatar)
    }
}

/// Same-origin URL for an avatar file.
#[must_use]
pub fn avatar_url(file: &str) -> String {
    format!("/avatars/{}", urlencoding::encode(file))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    /// CSS modifier class.
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A one-shot notification shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the visitor's age verification decision.
    pub const AGE_GATE: &str = "age_gate";

    /// Key for the local basket copy.
    pub const BASKET: &str = "basket";

    /// Key for the free-shipping latch.
    pub const FREE_SHIPPING: &str = "free_shipping";

    /// Key for the pending notification.
    pub const FLASH: &str = "flash";
}

// =============================================================================
// Typed accessors
//
// Reads fall back to defaults and log on store errors so a broken session
// degrades to an anonymous visit instead of a 500.
// =============================================================================

pub async fn age_gate(session: &Session) -> AgeGate {
    read(session, keys::AGE_GATE).await.unwrap_or_default()
}

/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn set_age_gate(
    session: &Session,
    gate: AgeGate,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::AGE_GATE, gate).await
}

pub async fn basket(session: &Session) -> Basket {
    read(session, keys::BASKET).await.unwrap_or_default()
}

/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn set_basket(
    session: &Session,
    basket: &Basket,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::BASKET, basket).await
}

pub async fn free_shipping(session: &Session) -> bool {
    read(session, keys::FREE_SHIPPING).await.unwrap_or(false)
}

/// Latch free shipping for the rest of the session.
///
/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn achieve_free_shipping(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::FREE_SHIPPING, true).await
}

/// Start the next order without the free-shipping latch.
///
/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn reset_free_shipping(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<bool>(keys::FREE_SHIPPING).await.map(|_| ())
}

/// Queue a notification for the next page.
pub async fn push_flash(session: &Session, flash: Flash) {
    if let Err(e) = session.insert(keys::FLASH, flash).await {
        tracing::warn!("Failed to store flash message: {e}");
    }
}

/// Take the pending notification, if any.
pub async fn take_flash(session: &Session) -> Option<Flash> {
    session
        .remove::<Flash>(keys::FLASH)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to read flash message: {e}");
            None
        })
}

async fn read<T: serde::de::DeserializeOwned>(session: &Session, key: &str) -> Option<T> {
    session.get::<T>(key).await.unwrap_or_else(|e| {
        tracing::warn!(key, "Failed to read session value: {e}");
        None
    })
}
