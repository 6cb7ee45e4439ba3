//! Product detail route handler.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use marketmate_core::review::{self, MAX_COMMENT_CHARS};
use marketmate_core::{Product, ProductId, Review, ReviewEligibility};
use tower_sessions::Session;
use tracing::instrument;

use super::store::STORE_PATH;
use crate::backend::{BackendError, DEFAULT_AVATAR};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{Layout, OptionalAuth};
use crate::models::session::{self as session_data, avatar_url};
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub image_url: String,
    pub is_alcohol: bool,
    pub average_rating: String,
    pub review_count: usize,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            price: product.price.to_string(),
            image_url: product.image_url.clone(),
            is_alcohol: product.is_alcohol,
            average_rating: product.average_rating().to_string(),
            review_count: product.reviews.len(),
        }
    }
}

/// Review display data for templates.
#[derive(Debug, Clone)]
pub struct ReviewView {
    pub author: String,
    pub avatar_url: String,
    pub rating: u8,
    pub comment: String,
    /// The visitor wrote this review.
    pub can_manage: bool,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "product.html")]
pub struct ProductTemplate {
    pub layout: Layout,
    pub product: ProductView,
    pub reviews: Vec<ReviewView>,
    pub can_review: bool,
    /// Why the review form is hidden, for logged-in visitors.
    pub review_notice: Option<&'static str>,
    pub max_comment_chars: usize,
}

/// Display a product with its reviews.
///
/// Alcohol products are only shown to verified adults; everyone else is sent
/// back to the store.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let product = load_product(&state, ProductId::new(id)).await?;

    if !session_data::age_gate(&session).await.permits(&product) {
        session_data::push_flash(
            &session,
            Flash::info("Please verify your age to view this product."),
        )
        .await;
        return Ok(Redirect::to(STORE_PATH).into_response());
    }

    let eligibility = match &user {
        Some(user) => {
            let purchased = purchased_products(&state, user).await;
            ReviewEligibility::evaluate(&product, Some(&user.username), &purchased)
        }
        None => ReviewEligibility::NotPurchased,
    };

    let avatars = match &user {
        Some(user) => avatars(&state, user).await,
        None => HashMap::new(),
    };
    let username = user.as_ref().map(|u| u.username.as_str());

    let reviews = product
        .reviews_newest_first()
        .map(|r| review_view(r, username, &avatars))
        .collect();

    Ok(ProductTemplate {
        layout: Layout::load(&session).await,
        product: ProductView::from(&product),
        reviews,
        can_review: eligibility.is_eligible(),
        review_notice: user.as_ref().and_then(|_| eligibility.notice()),
        max_comment_chars: MAX_COMMENT_CHARS,
    }
    .into_response())
}

/// Fetch a product, mapping a backend 404 to a page-level 404.
pub(super) async fn load_product(state: &AppState, id: ProductId) -> Result<Product> {
    state.backend().product(id).await.map_err(|e| match e {
        BackendError::NotFound(_) => AppError::NotFound(format!("product {id}")),
        e => AppError::Backend(e),
    })
}

/// Product ids the user has bought; empty when the lookup fails.
pub(super) async fn purchased_products(state: &AppState, user: &CurrentUser) -> Vec<ProductId> {
    state
        .backend()
        .purchased_products(&user.token)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load purchases for {}: {e}", user.username);
            Vec::new()
        })
}

async fn avatars(state: &AppState, user: &CurrentUser) -> HashMap<String, String> {
    match state.backend().all_users(&user.token).await {
        Ok(users) => users
            .iter()
            .map(|u| (u.username.clone(), u.avatar_file().to_string()))
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to load reviewer avatars: {e}");
            HashMap::new()
        }
    }
}

fn review_view(
    review: &Review,
    username: Option<&str>,
    avatars: &HashMap<String, String>,
) -> ReviewView {
    let avatar = avatars
        .get(&review.author)
        .map_or(DEFAULT_AVATAR, String::as_str);
    ReviewView {
        author: review.author.clone(),
        avatar_url: avatar_url(avatar),
        rating: review.rating.get(),
        comment: review.comment.clone(),
        can_manage: review::can_manage(review, username),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketmate_core::Rating;

    fn review(author: &str) -> Review {
        Review {
            author: author.to_string(),
            rating: Rating::new(4).unwrap(),
            comment: "Crisp".to_string(),
        }
    }

    #[test]
    fn test_review_view_uses_known_avatar() {
        let avatars = HashMap::from([("ana".to_string(), "ana.png".to_string())]);
        let view = review_view(&review("ana"), Some("ana"), &avatars);
        assert_eq!(view.avatar_url, "/avatars/ana.png");
        assert!(view.can_manage);
    }

    #[test]
    fn test_review_view_falls_back_to_default_avatar() {
        let view = review_view(&review("bob"), Some("ana"), &HashMap::new());
        assert_eq!(view.avatar_url, format!("/avatars/{DEFAULT_AVATAR}"));
        assert!(!view.can_manage);
    }
}
