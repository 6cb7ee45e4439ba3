//! Basket and checkout route handlers.
//!
//! The session holds the working copy of the basket. Every change is applied
//! there first and then the whole basket is pushed to the backend.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use marketmate_core::{Basket, BasketTotals, CheckoutForm, Product, ProductId, find_product};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::redirect_back;
use super::store::STORE_PATH;
use crate::filters;
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::{Layout, OptionalAuth, RequireAuth};
use crate::models::session as session_data;
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

pub const CHECKOUT_PATH: &str = "/checkout";

/// Shown on the checkout page until the threshold is reached.
pub const FREE_SHIPPING_NOTE: &str = "Free shipment if your purchase is 20€ or more.";

/// Shown when the purchase succeeded but the backend basket was not emptied.
pub const STALE_BASKET_MESSAGE: &str = "Thank you for your purchase! Your saved cart could not \
     be emptied, so items may reappear the next time you log in.";

const CLEAR_ATTEMPTS: u32 = 2;

// =============================================================================
// Forms
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i64,
    pub quantity: Option<u32>,
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityForm {
    pub product_id: i64,
    /// Only the sign is used: one unit up or down.
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveLineForm {
    pub product_id: i64,
}

// =============================================================================
// Views
// =============================================================================

/// Checkout line display data for templates.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: i64,
    pub name: String,
    pub image_url: String,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
    /// The product is still in the catalog.
    pub available: bool,
}

impl CheckoutLine {
    fn new(product_id: ProductId, quantity: u32, product: Option<&Product>) -> Self {
        match product {
            Some(product) => Self {
                product_id: product_id.as_i64(),
                name: product.name.clone(),
                image_url: product.image_url.clone(),
                unit_price: product.price.to_string(),
                quantity,
                line_total: (product.price * quantity).to_string(),
                available: true,
            },
            None => Self {
                product_id: product_id.as_i64(),
                name: format!("Product #{product_id}"),
                image_url: String::new(),
                unit_price: "-".to_string(),
                quantity,
                line_total: "-".to_string(),
                available: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct TotalsView {
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
    pub free_shipping: bool,
}

impl From<BasketTotals> for TotalsView {
    fn from(totals: BasketTotals) -> Self {
        Self {
            subtotal: totals.subtotal.to_string(),
            shipping: totals.shipping.to_string(),
            total: totals.total.to_string(),
            free_shipping: totals.shipping.is_zero(),
        }
    }
}

/// Address fields echoed back after a failed submission. Payment fields are
/// never echoed.
#[derive(Debug, Clone, Default)]
pub struct AddressView {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub lines: Vec<CheckoutLine>,
    pub totals: TotalsView,
    pub shipping_note: &'static str,
    pub address: AddressView,
    /// Labels of empty fields from the last submission.
    pub missing: Vec<&'static str>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Add a product to the basket from a store card.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Redirect {
    let Some(user) = user else {
        session_data::push_flash(
            &session,
            Flash::error("You need to be logged in to add items to the cart."),
        )
        .await;
        return Redirect::to(LOGIN_PATH);
    };

    let quantity = form.quantity.filter(|q| *q > 0).unwrap_or(1);
    let mut basket = session_data::basket(&session).await;
    basket.add(ProductId::new(form.product_id), quantity);

    let flash = match save_basket(&state, &session, &user, &basket).await {
        Ok(()) => Flash::success("Item added to cart!"),
        Err(()) => Flash::error("Failed to add item to cart."),
    };
    session_data::push_flash(&session, flash).await;

    redirect_back(form.return_to.as_deref(), STORE_PATH)
}

/// Display the checkout page.
#[instrument(skip_all)]
pub async fn checkout_page(
    State(state): State<AppState>,
    session: Session,
    _: RequireAuth,
    layout: Layout,
) -> Response {
    render_checkout(&state, &session, layout, AddressView::default(), Vec::new())
        .await
        .into_response()
}

/// Change a line's quantity by one unit.
#[instrument(skip(state, session, user))]
pub async fn change_quantity(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<QuantityForm>,
) -> Redirect {
    let mut basket = session_data::basket(&session).await;
    if basket.adjust(ProductId::new(form.product_id), form.delta.signum())
        && save_basket(&state, &session, &user, &basket).await.is_err()
    {
        session_data::push_flash(&session, Flash::error("Failed to update your cart.")).await;
    }
    Redirect::to(CHECKOUT_PATH)
}

/// Remove a line from the basket.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<RemoveLineForm>,
) -> Redirect {
    let mut basket = session_data::basket(&session).await;
    if basket.remove(ProductId::new(form.product_id))
        && save_basket(&state, &session, &user, &basket).await.is_err()
    {
        session_data::push_flash(&session, Flash::error("Failed to update your cart.")).await;
    }
    Redirect::to(CHECKOUT_PATH)
}

/// Submit the purchase.
///
/// Every address and payment field must be filled in. Payment details are
/// only checked for presence; the backend records the purchase from the
/// basket's product ids.
#[instrument(skip(state, session, layout, user, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    layout: Layout,
    Form(form): Form<CheckoutForm>,
) -> Response {
    if let Err(e) = form.validate() {
        let address = AddressView {
            street: form.street.trim().to_string(),
            city: form.city.trim().to_string(),
            postal_code: form.postal_code.trim().to_string(),
        };
        let page = render_checkout(
            &state,
            &session,
            layout.with_flash(Flash::error(e.to_string())),
            address,
            e.missing,
        )
        .await;
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    let mut basket = session_data::basket(&session).await;
    if basket.is_empty() {
        session_data::push_flash(&session, Flash::error("Your cart is empty.")).await;
        return Redirect::to(CHECKOUT_PATH).into_response();
    }

    if let Err(e) = state
        .backend()
        .purchase(&user.token, basket.product_ids())
        .await
    {
        tracing::error!("Failed to complete purchase for {}: {e}", user.username);
        session_data::push_flash(
            &session,
            Flash::error("Failed to complete your purchase. Please try again."),
        )
        .await;
        return Redirect::to(CHECKOUT_PATH).into_response();
    }

    tracing::info!(
        username = %user.username,
        lines = basket.lines().len(),
        "Purchase completed"
    );
    crate::error::add_breadcrumb("checkout", "Purchase completed", None);

    basket.clear();
    if let Err(e) = session_data::reset_free_shipping(&session).await {
        tracing::warn!("Failed to reset free shipping after purchase: {e}");
    }

    let flash = if clear_after_purchase(&state, &session, &user, &basket).await {
        Flash::success("Thank you for your purchase!")
    } else {
        Flash::info(STALE_BASKET_MESSAGE)
    };
    session_data::push_flash(&session, flash).await;

    Redirect::to("/").into_response()
}

// =============================================================================
// Helpers
// =============================================================================

/// Store the basket in the session and push it to the backend.
///
/// Failures are logged here; callers only pick the notification.
async fn save_basket(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    basket: &Basket,
) -> Result<(), ()> {
    if let Err(e) = session_data::set_basket(session, basket).await {
        tracing::error!("Failed to store basket in session: {e}");
        return Err(());
    }
    state
        .backend()
        .sync_basket(&user.token, basket)
        .await
        .map_err(|e| tracing::warn!("Failed to sync basket for {}: {e}", user.username))
}

/// Push the emptied basket, retrying once. Returns whether the backend
/// accepted it.
async fn clear_after_purchase(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    basket: &Basket,
) -> bool {
    for attempt in 1..=CLEAR_ATTEMPTS {
        if save_basket(state, session, user, basket).await.is_ok() {
            return true;
        }
        tracing::warn!(attempt, "Basket still holds purchased items on the backend");
    }
    false
}

async fn render_checkout(
    state: &AppState,
    session: &Session,
    mut layout: Layout,
    address: AddressView,
    missing: Vec<&'static str>,
) -> CheckoutTemplate {
    // The session copy leads; the backend copy is only read at login
    let basket = session_data::basket(session).await;
    layout.basket_count = basket.item_count();

    let catalog = match state.backend().all_products().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Failed to load catalog for checkout: {e}");
            if layout.flash.is_none() {
                layout = layout.with_flash(Flash::error("Failed to load products."));
            }
            Default::default()
        }
    };

    let already_free = session_data::free_shipping(session).await;
    let totals = basket.totals(&catalog, state.shipping(), already_free);
    if totals.reaches_threshold && !already_free {
        if let Err(e) = session_data::achieve_free_shipping(session).await {
            tracing::warn!("Failed to record free shipping: {e}");
        }
    }

    let lines = basket
        .lines()
        .iter()
        .map(|line| {
            CheckoutLine::new(
                line.product_id,
                line.quantity,
                find_product(&catalog, line.product_id),
            )
        })
        .collect();

    CheckoutTemplate {
        layout,
        lines,
        totals: totals.into(),
        shipping_note: FREE_SHIPPING_NOTE,
        address,
        missing,
    }
}
