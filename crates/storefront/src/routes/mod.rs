//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /search?q=              - Search suggestions
//!
//! # Store
//! GET  /store                  - Product store (?category|price, sort, dir, page)
//! GET  /store/favs             - Favorites store (requires auth)
//! POST /store/age              - Age verification
//! POST /favorites/toggle       - Add or remove a favorite
//!
//! # Products & reviews
//! GET  /products/{id}                 - Product detail
//! POST /products/{id}/reviews         - Add review
//! GET  /products/{id}/reviews/edit    - Edit form (author only)
//! POST /products/{id}/reviews/edit    - Update review
//! GET  /products/{id}/reviews/delete  - Delete confirmation
//! POST /products/{id}/reviews/delete  - Delete review
//!
//! # Cart & checkout (requires auth)
//! POST /cart/add               - Add to basket
//! GET  /checkout               - Checkout page
//! POST /checkout               - Submit purchase
//! POST /checkout/quantity      - +1 / -1 on a line
//! POST /checkout/remove        - Remove a line
//!
//! # Auth
//! GET  /auth                   - Login / register page (?mode=register)
//! POST /auth/login             - Login action (rate limited)
//! POST /auth/register          - Register action (rate limited)
//! POST /auth/logout            - Logout action
//!
//! # Account
//! GET  /account                - Profile and avatar (requires auth)
//! POST /account/avatar         - Avatar upload
//! GET  /avatars/{file}         - Avatar image proxy
//! ```

pub mod account;
pub mod age;
pub mod auth;
pub mod cart;
pub mod favorites;
pub mod home;
pub mod products;
pub mod reviews;
pub mod search;
pub mod store;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(store::index))
        .route("/favs", get(store::favorites))
        .route("/age", post(age::verify))
}

/// Create the product and review routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", post(reviews::create))
        .route(
            "/{id}/reviews/edit",
            get(reviews::edit_page).post(reviews::update),
        )
        .route(
            "/{id}/reviews/delete",
            get(reviews::delete_page).post(reviews::delete),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::checkout_page).post(cart::submit))
        .route("/quantity", post(cart::change_quantity))
        .route("/remove", post(cart::remove))
}

/// Create the auth routes router.
///
/// Credential submissions are rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/", get(auth::page))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    // Multipart framing on top of the image itself
    let body_limit = DefaultBodyLimit::max(account::MAX_AVATAR_BYTES + 64 * 1024);

    Router::new()
        .route("/", get(account::index))
        .route("/avatar", post(account::upload_avatar).layer(body_limit))
}

/// Create all page routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .route("/search", get(search::index))
        .route("/favorites/toggle", post(favorites::toggle))
        .route("/cart/add", post(cart::add))
        .route("/avatars/{file}", get(account::avatar))
        .nest("/store", store_routes())
        .nest("/products", product_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
}

/// A same-site path to send the visitor back to, if `candidate` is one.
///
/// Rejects absolute and protocol-relative URLs so form fields cannot turn
/// into open redirects.
#[must_use]
pub fn safe_return_path(candidate: Option<&str>) -> Option<&str> {
    candidate.filter(|path| {
        path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
    })
}

/// Redirect to `return_to` when it is a safe local path, else to `fallback`.
#[must_use]
pub fn redirect_back(return_to: Option<&str>, fallback: &str) -> Redirect {
    Redirect::to(safe_return_path(return_to).unwrap_or(fallback))
}
