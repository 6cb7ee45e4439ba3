//! Review route handlers.
//!
//! All mutations re-check on the server what the product page already hides:
//! only buyers may add a review, and only its author may change or delete it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use marketmate_core::review::{self, MAX_COMMENT_CHARS};
use marketmate_core::{Product, ProductId, Review, ReviewEligibility, ReviewSubmission};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::products::{ProductView, load_product, purchased_products};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{Layout, RequireAuth};
use crate::models::session as session_data;
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

pub const DELETE_CONFIRMATION: &str = "Are you sure you want to delete this review?";

/// Review form fields. The rating arrives as text so an unselected rating
/// reads as missing instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl ReviewForm {
    fn parse(&self) -> Result<ReviewSubmission, marketmate_core::ReviewError> {
        let rating = self
            .rating
            .as_deref()
            .and_then(|r| r.trim().parse::<i64>().ok());
        ReviewSubmission::parse(rating, &self.comment)
    }
}

/// Edit review page template.
#[derive(Template, WebTemplate)]
#[template(path = "review_edit.html")]
pub struct ReviewEditTemplate {
    pub layout: Layout,
    pub product: ProductView,
    pub rating: u8,
    pub comment: String,
    pub max_comment_chars: usize,
}

/// Delete review confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "review_delete.html")]
pub struct ReviewDeleteTemplate {
    pub layout: Layout,
    pub product: ProductView,
    pub rating: u8,
    pub comment: String,
    pub confirmation: &'static str,
}

fn product_path(id: i64) -> String {
    format!("/products/{id}")
}

async fn flash_and_return(session: &Session, id: i64, flash: Flash) -> Response {
    session_data::push_flash(session, flash).await;
    Redirect::to(&product_path(id)).into_response()
}

/// The visitor's own review of `product`.
fn own_review<'a>(product: &'a Product, user: &CurrentUser) -> Option<&'a Review> {
    product
        .reviews
        .iter()
        .find(|r| review::can_manage(r, Some(&user.username)))
}

/// Add a review.
#[instrument(skip(state, session, user, form))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    let product = load_product(&state, ProductId::new(id)).await?;

    let purchased = purchased_products(&state, &user).await;
    let eligibility = ReviewEligibility::evaluate(&product, Some(&user.username), &purchased);
    if let Some(notice) = eligibility.notice() {
        return Ok(flash_and_return(&session, id, Flash::error(notice)).await);
    }

    let submission = match form.parse() {
        Ok(submission) => submission,
        Err(e) => return Ok(flash_and_return(&session, id, Flash::error(e.to_string())).await),
    };

    let flash = match state
        .backend()
        .add_review(&user.token, product.id, &submission)
        .await
    {
        Ok(_) => Flash::success("Review submitted successfully"),
        Err(e) => {
            tracing::warn!("Failed to add review on {id}: {e}");
            Flash::error(
                e.visitor_message()
                    .unwrap_or("Failed to submit your review.")
                    .to_string(),
            )
        }
    };
    Ok(flash_and_return(&session, id, flash).await)
}

/// Display the edit form for the visitor's own review.
#[instrument(skip(state, session, user))]
pub async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let product = load_product(&state, ProductId::new(id)).await?;
    let Some(own) = own_review(&product, &user) else {
        return Ok(not_author(&session, id).await);
    };

    Ok(ReviewEditTemplate {
        layout: Layout::load(&session).await,
        rating: own.rating.get(),
        comment: own.comment.clone(),
        product: ProductView::from(&product),
        max_comment_chars: MAX_COMMENT_CHARS,
    }
    .into_response())
}

/// Save changes to the visitor's own review.
#[instrument(skip(state, session, user, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    let product = load_product(&state, ProductId::new(id)).await?;
    if own_review(&product, &user).is_none() {
        return Ok(not_author(&session, id).await);
    }

    let submission = match form.parse() {
        Ok(submission) => submission,
        Err(e) => {
            session_data::push_flash(&session, Flash::error(e.to_string())).await;
            return Ok(Redirect::to(&format!("/products/{id}/reviews/edit")).into_response());
        }
    };

    let flash = match state
        .backend()
        .update_review(&user.token, product.id, &user.username, &submission)
        .await
    {
        Ok(_) => Flash::success("Review updated successfully"),
        Err(e) => {
            tracing::warn!("Failed to update review on {id}: {e}");
            Flash::error("Failed to update your review.")
        }
    };
    Ok(flash_and_return(&session, id, flash).await)
}

/// Ask for confirmation before deleting the visitor's own review.
#[instrument(skip(state, session, user))]
pub async fn delete_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let product = load_product(&state, ProductId::new(id)).await?;
    let Some(own) = own_review(&product, &user) else {
        return Ok(not_author(&session, id).await);
    };

    Ok(ReviewDeleteTemplate {
        layout: Layout::load(&session).await,
        rating: own.rating.get(),
        comment: own.comment.clone(),
        product: ProductView::from(&product),
        confirmation: DELETE_CONFIRMATION,
    }
    .into_response())
}

/// Delete the visitor's own review.
#[instrument(skip(state, session, user))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let product = load_product(&state, ProductId::new(id)).await?;
    if own_review(&product, &user).is_none() {
        return Ok(not_author(&session, id).await);
    }

    let flash = match state
        .backend()
        .remove_review(&user.token, product.id, &user.username)
        .await
    {
        Ok(_) => Flash::success("Review deleted successfully"),
        Err(e) => {
            tracing::warn!("Failed to delete review on {id}: {e}");
            Flash::error("Failed to delete your review.")
        }
    };
    Ok(flash_and_return(&session, id, flash).await)
}

async fn not_author(session: &Session, id: i64) -> Response {
    flash_and_return(
        session,
        id,
        Flash::error("You can only change your own review."),
    )
    .await
}
