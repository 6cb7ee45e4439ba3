//! Favorite toggling from product cards.

use axum::{Form, extract::State, response::Redirect};
use marketmate_core::ProductId;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::redirect_back;
use super::store::STORE_PATH;
use crate::middleware::OptionalAuth;
use crate::middleware::auth::LOGIN_PATH;
use crate::models::Flash;
use crate::models::session as session_data;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteAction {
    Add,
    Remove,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteForm {
    pub product_id: i64,
    pub action: FavoriteAction,
    pub return_to: Option<String>,
}

/// Add or remove a favorite, then return to the page the visitor was on.
#[instrument(skip(state, session, user))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<FavoriteForm>,
) -> Redirect {
    let Some(user) = user else {
        session_data::push_flash(
            &session,
            Flash::error("You need to be logged in to manage favorites."),
        )
        .await;
        return Redirect::to(LOGIN_PATH);
    };

    let id = ProductId::new(form.product_id);
    let flash = match form.action {
        FavoriteAction::Add => match state.backend().add_favorite(&user.token, id).await {
            Ok(()) => Flash::success("Added to favorites!"),
            Err(e) => {
                tracing::warn!("Failed to add favorite {id}: {e}");
                Flash::error("Failed to add to favorites.")
            }
        },
        FavoriteAction::Remove => match state.backend().remove_favorite(&user.token, id).await {
            Ok(()) => Flash::success("Removed from favorites!"),
            Err(e) => {
                tracing::warn!("Failed to remove favorite {id}: {e}");
                Flash::error("Failed to remove from favorites.")
            }
        },
    };
    session_data::push_flash(&session, flash).await;

    redirect_back(form.return_to.as_deref(), STORE_PATH)
}
