//! Per-page chrome extractor.
//!
//! Every full page renders the same header (user badge, basket count) and
//! the pending flash notification. [`Layout`] gathers those from the session
//! once so page handlers only add their own content.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::session::{self, keys};
use crate::models::{CurrentUser, Flash};

/// Header badge for a logged-in visitor.
#[derive(Debug, Clone)]
pub struct UserBadge {
    pub username: String,
    pub avatar_url: String,
}

impl From<&CurrentUser> for UserBadge {
    fn from(user: &CurrentUser) -> Self {
        Self {
            username: user.username.clone(),
            avatar_url: user.avatar_url(),
        }
    }
}

/// Shared data for `base.html`.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub user: Option<UserBadge>,
    /// Taken from the session: shown once, then gone.
    pub flash: Option<Flash>,
    pub basket_count: u32,
}

impl Layout {
    /// Replace the pending notification (e.g. an inline validation error).
    #[must_use]
    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Read the header data and take the pending flash.
    ///
    /// Handlers that may redirect instead of rendering call this once they
    /// know a page is coming, so the flash survives the redirect.
    pub async fn load(session: &Session) -> Self {
        let user = session
            .get::<CurrentUser>(keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let basket_count = if user.is_some() {
            session::basket(session).await.item_count()
        } else {
            0
        };

        Self {
            user: user.as_ref().map(UserBadge::from),
            flash: session::take_flash(session).await,
            basket_count,
        }
    }
}

impl<S> FromRequestParts<S> for Layout
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<Session>() {
            Some(session) => Self::load(session).await,
            None => Self::default(),
        })
    }
}
