//! Integration test harness for the MarketMate storefront.
//!
//! Each test gets its own pair of servers on ephemeral ports:
//!
//! - a [`FakeBackend`] speaking the MarketMate REST API from in-memory state,
//!   recording every mutation it receives
//! - the real storefront router pointed at it
//!
//! No external services are needed:
//!
//! ```bash
//! cargo test -p marketmate-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use marketmate_storefront::config::{BackendConfig, LogFormat, StorefrontConfig};
use marketmate_storefront::state::AppState;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

/// Seeded account that can log in.
pub const USER_EMAIL: &str = "ana@example.com";
pub const USER_PASSWORD: &str = "secret123";
pub const USERNAME: &str = "ana";

/// Seeded product ids.
pub const APPLE: i64 = 1;
pub const SOURDOUGH: i64 = 2;
pub const MERLOT: i64 = 3;
pub const CHEDDAR: i64 = 4;

/// Author of the review seeded on the sourdough.
pub const OTHER_REVIEWER: &str = "carla";
pub const OTHER_REVIEW_COMMENT: &str = "A bit too sour for me";

// =============================================================================
// Fake backend
// =============================================================================

/// A registered backend user.
#[derive(Debug, Clone)]
pub struct FakeUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
}

/// A review mutation as received by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReview {
    pub product_id: i64,
    pub username: String,
    pub rating: u8,
    pub comment: String,
}

/// In-memory backend data plus a log of what the storefront sent.
#[derive(Debug, Default)]
pub struct BackendState {
    pub products: Vec<Value>,
    pub users: Vec<FakeUser>,
    pub baskets: HashMap<String, Vec<(i64, u32)>>,
    pub favorites: HashMap<String, Vec<i64>>,
    pub purchased: HashMap<String, Vec<i64>>,
    /// Every basket pushed with `POST /api/me/basket`, in order.
    pub basket_posts: Vec<Vec<(i64, u32)>>,
    /// Every `POST /api/me/purchase` body.
    pub purchases: Vec<Vec<i64>>,
    pub reviews: Vec<RecordedReview>,
    /// When set, `POST /api/me/basket` answers 500 and keeps nothing.
    pub fail_basket_sync: bool,
}

impl BackendState {
    /// Four products (one alcoholic) and one user who has bought the sourdough.
    /// The sourdough already carries a review by another shopper.
    #[must_use]
    pub fn seeded() -> Self {
        let product = |id: i64, name: &str, category: &str, price: f64, is_alcohol: bool| {
            json!({
                "id": id,
                "name": name,
                "description": format!("{name} from the market"),
                "category": category,
                "price": price,
                "image_url": format!("https://img.example/{id}.png"),
                "is_alcohol": is_alcohol,
                "reviews": [],
            })
        };

        let mut sourdough = product(SOURDOUGH, "Sourdough", "Bakery", 4.5, false);
        sourdough["reviews"] = json!([{
            "author": OTHER_REVIEWER,
            "rating": 3,
            "comment": OTHER_REVIEW_COMMENT,
        }]);

        Self {
            products: vec![
                product(APPLE, "Apple", "Fruit", 0.9, false),
                sourdough,
                product(MERLOT, "Merlot", "Drinks", 12.0, true),
                product(CHEDDAR, "Cheddar", "Deli", 6.5, false),
            ],
            users: vec![FakeUser {
                username: USERNAME.to_string(),
                email: USER_EMAIL.to_string(),
                password: USER_PASSWORD.to_string(),
                avatar: None,
            }],
            purchased: HashMap::from([(USERNAME.to_string(), vec![SOURDOUGH])]),
            ..Self::default()
        }
    }

    /// Reviews currently stored on a product, as the backend would serve them.
    #[must_use]
    pub fn product_reviews(&self, id: i64) -> Vec<Value> {
        self.products
            .iter()
            .find(|p| p["id"] == id)
            .and_then(|p| p["reviews"].as_array())
            .cloned()
            .unwrap_or_default()
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<FakeUser> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer token-")?;
        self.users.iter().find(|u| u.username == token).cloned()
    }
}

type Shared = Arc<Mutex<BackendState>>;

/// Handle to a running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    pub url: Url,
    state: Shared,
}

impl FakeBackend {
    /// Serve `state` on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn(state: BackendState) -> Self {
        let state: Shared = Arc::new(Mutex::new(state));
        let router = backend_router(Arc::clone(&state));
        let addr = serve(router).await;
        let url = Url::parse(&format!("http://{addr}/")).expect("valid backend url");
        Self { url, state }
    }

    /// Lock the backend state for inspection.
    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        lock(&self.state)
    }
}

fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Invalid or missing token")
}

fn backend_router(state: Shared) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "OK" })) }))
        .route("/api/products/all_products", get(all_products))
        .route("/api/products/{id}", get(product))
        .route("/api/products/{id}/add-review", post(add_review))
        .route("/api/products/{id}/update-review", axum::routing::put(update_review))
        .route(
            "/api/products/{id}/remove-review",
            axum::routing::delete(remove_review),
        )
        .route("/api/me/basket", get(basket).post(replace_basket))
        .route("/api/me/favorites", get(favorites).post(add_favorite))
        .route("/api/me/favorites/remove", post(remove_favorite))
        .route("/api/me/purchase", post(purchase))
        .route("/api/me/purchased-products", get(purchased_products))
        .route("/api/me/info", get(info))
        .route("/api/me/all-users", get(all_users))
        .route("/api/me/avatar/{file}", get(avatar))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .with_state(state)
}

async fn all_products(State(state): State<Shared>) -> Json<Vec<Value>> {
    Json(lock(&state).products.clone())
}

async fn product(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let state = lock(&state);
    match state.products.iter().find(|p| p["id"] == id) {
        Some(product) => Json(product.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Product not found"),
    }
}

#[derive(Deserialize)]
struct ReviewBody {
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    rating: Option<u8>,
    #[serde(default)]
    comment: String,
}

async fn add_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let rating = body.rating.unwrap_or(0);
    state.reviews.push(RecordedReview {
        product_id: id,
        username: user.username.clone(),
        rating,
        comment: body.comment.clone(),
    });
    if let Some(product) = state.products.iter_mut().find(|p| p["id"] == id)
        && let Some(reviews) = product["reviews"].as_array_mut()
    {
        reviews.push(json!({
            "author": user.username,
            "rating": rating,
            "comment": body.comment,
        }));
    }
    Json(json!({ "message": "Review added successfully" })).into_response()
}

async fn update_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    if body.author_name.as_deref() != Some(user.username.as_str()) {
        return error(StatusCode::FORBIDDEN, "Not your review");
    }
    if let Some(product) = state.products.iter_mut().find(|p| p["id"] == id)
        && let Some(reviews) = product["reviews"].as_array_mut()
    {
        for review in reviews.iter_mut().filter(|r| r["author"] == user.username.as_str()) {
            review["rating"] = json!(body.rating.unwrap_or(0));
            review["comment"] = json!(body.comment);
        }
    }
    Json(json!({ "message": "Review updated successfully" })).into_response()
}

async fn remove_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    if body.author_name.as_deref() != Some(user.username.as_str()) {
        return error(StatusCode::FORBIDDEN, "Not your review");
    }
    if let Some(product) = state.products.iter_mut().find(|p| p["id"] == id)
        && let Some(reviews) = product["reviews"].as_array_mut()
    {
        reviews.retain(|r| r["author"] != user.username.as_str());
    }
    Json(json!({ "message": "Review removed successfully" })).into_response()
}

#[derive(Deserialize)]
struct BasketLineBody {
    product_id: i64,
    quantity: u32,
}

async fn basket(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let lines: Vec<Value> = state
        .baskets
        .get(&user.username)
        .into_iter()
        .flatten()
        .map(|(id, quantity)| json!({ "product_id": id, "quantity": quantity }))
        .collect();
    Json(lines).into_response()
}

async fn replace_basket(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(lines): Json<Vec<BasketLineBody>>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    if state.fail_basket_sync {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Basket store unavailable");
    }
    let lines: Vec<(i64, u32)> = lines.iter().map(|l| (l.product_id, l.quantity)).collect();
    state.basket_posts.push(lines.clone());
    state.baskets.insert(user.username, lines);
    Json(json!({ "message": "Basket updated" })).into_response()
}

#[derive(Deserialize)]
struct FavoriteBody {
    product_id: i64,
}

async fn favorites(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let ids = state.favorites.get(&user.username).cloned().unwrap_or_default();
    let products: Vec<Value> = state
        .products
        .iter()
        .filter(|p| p["id"].as_i64().is_some_and(|id| ids.contains(&id)))
        .cloned()
        .collect();
    Json(products).into_response()
}

async fn add_favorite(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<FavoriteBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let ids = state.favorites.entry(user.username).or_default();
    if !ids.contains(&body.product_id) {
        ids.push(body.product_id);
    }
    Json(json!({ "message": "Product added to favorites" })).into_response()
}

async fn remove_favorite(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<FavoriteBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let ids = state.favorites.entry(user.username).or_default();
    let before = ids.len();
    ids.retain(|id| *id != body.product_id);
    if ids.len() == before {
        return error(StatusCode::BAD_REQUEST, "Product not removed");
    }
    Json(json!({ "message": "Product removed from favorites" })).into_response()
}

#[derive(Deserialize)]
struct PurchaseBody {
    purchased_products: Vec<i64>,
}

async fn purchase(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<PurchaseBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    state.purchases.push(body.purchased_products.clone());
    state
        .purchased
        .entry(user.username)
        .or_default()
        .extend(body.purchased_products);
    Json(json!({ "message": "Purchase successful" })).into_response()
}

async fn purchased_products(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    match state.purchased.get(&user.username) {
        Some(ids) => Json(json!(ids)).into_response(),
        // Accounts without purchases store an empty string
        None => Json(json!("")).into_response(),
    }
}

async fn info(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    Json(json!({
        "username": user.username,
        "email": user.email,
        "avatar": user.avatar,
    }))
    .into_response()
}

async fn all_users(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    if state.user_for(&headers).is_none() {
        return unauthorized();
    }
    let users: Vec<Value> = state
        .users
        .iter()
        .map(|u| json!({ "username": u.username, "avatar": u.avatar }))
        .collect();
    Json(users).into_response()
}

/// A 1x1 transparent PNG.
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

async fn avatar(Path(file): Path<String>) -> Response {
    if file.ends_with(".png") {
        ([("content-type", "image/png")], PIXEL_PNG).into_response()
    } else {
        error(StatusCode::NOT_FOUND, "Avatar not found")
    }
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let state = lock(&state);
    match state
        .users
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
    {
        Some(user) => {
            Json(json!({ "access_token": format!("token-{}", user.username) })).into_response()
        }
        None => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
    email: String,
    password: String,
}

async fn register(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Response {
    let mut state = lock(&state);
    if state.users.iter().any(|u| u.username == body.username) {
        return error(StatusCode::BAD_REQUEST, "Username already taken");
    }
    if state.users.iter().any(|u| u.email == body.email) {
        return error(StatusCode::BAD_REQUEST, "Email already registered");
    }
    state.users.push(FakeUser {
        username: body.username,
        email: body.email,
        password: body.password,
        avatar: None,
    });
    (
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    )
        .into_response()
}

// =============================================================================
// Storefront under test
// =============================================================================

/// A running storefront wired to its own fake backend.
pub struct TestApp {
    pub url: String,
    /// Cookie-keeping client that does not follow redirects.
    pub client: reqwest::Client,
    pub backend: FakeBackend,
}

impl TestApp {
    /// Start a storefront over a freshly seeded backend.
    pub async fn spawn() -> Self {
        Self::spawn_with(BackendState::seeded()).await
    }

    /// Start a storefront over `state`.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot start.
    pub async fn spawn_with(state: BackendState) -> Self {
        let backend = FakeBackend::spawn(state).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront listener");
        let addr = listener.local_addr().expect("listener has an address");
        let url = format!("http://{addr}");

        let config = StorefrontConfig {
            host: addr.ip(),
            port: addr.port(),
            base_url: url.clone(),
            backend: BackendConfig {
                timeout: Duration::from_secs(5),
                ..BackendConfig::new(backend.url.clone())
            },
            log_format: LogFormat::Pretty,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
        };
        let state = AppState::new(config).expect("Failed to build storefront state");
        let app = marketmate_storefront::app(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("storefront server");
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url,
            client,
            backend,
        }
    }

    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{path}", self.url))
            .send()
            .await
            .expect("GET request failed")
    }

    /// # Panics
    ///
    /// Panics if the request or body read fails.
    pub async fn get_text(&self, path: &str) -> String {
        self.get(path).await.text().await.expect("response body")
    }

    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.url))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Log in as the seeded user.
    ///
    /// # Panics
    ///
    /// Panics unless the storefront redirects home.
    pub async fn login(&self) {
        let response = self
            .post_form(
                "/auth/login",
                &[("email", USER_EMAIL), ("password", USER_PASSWORD)],
            )
            .await;
        assert_eq!(location(&response), Some("/"), "login should redirect home");
    }

    /// Record a birth date for the visitor's age gate.
    pub async fn verify_age(&self, birth_date: &str) {
        self.post_form("/store/age", &[("birth_date", birth_date)])
            .await;
    }
}

/// The `Location` header of a redirect, if any.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind backend listener");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("backend server");
    });
    addr
}
