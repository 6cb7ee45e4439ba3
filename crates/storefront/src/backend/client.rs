//! Backend REST client implementation.
//!
//! Uses `reqwest` 0.13 for HTTP. Caches the catalog and single products
//! using `moka` (TTL from configuration, default 5 minutes).

use std::sync::Arc;

use marketmate_core::{Basket, Credentials, Product, ProductId, Registration, ReviewSubmission};
use moka::future::Cache;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::cache::{CacheKey, CacheValue};
use super::types::{
    ApiMessage, BearerToken, FavoriteRequest, LoginRequest, LoginResponse, NewReviewRequest,
    PurchaseRequest, PurchasedIds, RegisterRequest, RemoveReviewRequest, UpdateReviewRequest,
    UserInfo, UserSummary, WireBasketLine, WireProduct, convert_basket, convert_products,
};
use super::BackendError;
use crate::config::BackendConfig;

/// Longest body excerpt written to logs.
const LOG_BODY_CHARS: usize = 500;

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the `MarketMate` REST backend.
///
/// Cheap to clone; all clones share one connection pool and cache.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("marketmate-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_ttl)
            .build();

        // Url::join replaces the last path segment unless the base ends with '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url,
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::Invalid(format!("bad request path {path}: {e}")))
    }

    fn get(
        &self,
        path: &str,
        token: Option<&BearerToken>,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        let request = self.inner.client.get(self.url(path)?);
        Ok(match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &BearerToken,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        Ok(self
            .inner
            .client
            .request(method, self.url(path)?)
            .bearer_auth(token.expose()))
    }

    /// Send a request and return the status and body of a 2xx response.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), BackendError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status.is_success() {
            return Ok((status, body));
        }

        let message = ApiMessage::parse(&body)
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                debug!(status = %status, "Backend rejected credentials or token");
                Err(BackendError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(message)),
            _ => {
                if status.is_server_error() {
                    tracing::error!(
                        status = %status,
                        body = %preview(&body),
                        "Backend returned server error"
                    );
                } else {
                    tracing::warn!(
                        status = %status,
                        message = %message,
                        "Backend rejected request"
                    );
                }
                Err(BackendError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Send a request and parse the JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let (_, body) = self.send(request).await?;
        parse_body(&body)
    }

    /// Send a mutation and return the backend's confirmation text.
    ///
    /// Some endpoints answer 200 with `{"error": ..}`; those become
    /// [`BackendError::Rejected`] as well.
    async fn execute_message(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<String, BackendError> {
        let (status, body) = self.send(request).await?;
        let envelope = ApiMessage::parse(&body);
        if let Some(error) = envelope.error {
            tracing::warn!(
                status = %status,
                error = %error,
                "Backend reported error with success status"
            );
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: error,
            });
        }
        Ok(envelope.message.unwrap_or_default())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Full product catalog in backend order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn all_products(&self) -> Result<Arc<Vec<Product>>, BackendError> {
        if let Some(CacheValue::Catalog(catalog)) = self.inner.cache.get(&CacheKey::Catalog).await
        {
            debug!("Cache hit for catalog");
            return Ok(catalog);
        }

        let wire: Vec<WireProduct> = self
            .execute(self.get("api/products/all_products", None)?)
            .await?;
        let catalog = Arc::new(convert_products(wire));
        debug!(count = catalog.len(), "Fetched catalog");

        self.inner
            .cache
            .insert(CacheKey::Catalog, CacheValue::Catalog(Arc::clone(&catalog)))
            .await;

        Ok(catalog)
    }

    /// A single product with its reviews.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, or an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, BackendError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let wire: WireProduct = self
            .execute(self.get(&format!("api/products/{id}"), None)?)
            .await?;
        let product = Product::try_from(wire)
            .map_err(|e| BackendError::Invalid(e.to_string()))?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Drop all cached catalog data.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// # Errors
    ///
    /// Returns `Rejected` if the backend refuses the review (e.g. a duplicate).
    #[instrument(skip(self, token, review), fields(product_id = %id))]
    pub async fn add_review(
        &self,
        token: &BearerToken,
        id: ProductId,
        review: &ReviewSubmission,
    ) -> Result<String, BackendError> {
        let body = NewReviewRequest {
            rating: review.rating.get(),
            comment: &review.comment,
        };
        let request = self
            .request(reqwest::Method::POST, &format!("api/products/{id}/add-review"), token)?
            .json(&body);
        let result = self.execute_message(request).await;
        self.invalidate_catalog();
        result
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the backend refuses it.
    #[instrument(skip(self, token, review), fields(product_id = %id))]
    pub async fn update_review(
        &self,
        token: &BearerToken,
        id: ProductId,
        author: &str,
        review: &ReviewSubmission,
    ) -> Result<String, BackendError> {
        let body = UpdateReviewRequest {
            author_name: author,
            rating: review.rating.get(),
            comment: &review.comment,
        };
        let request = self
            .request(reqwest::Method::PUT, &format!("api/products/{id}/update-review"), token)?
            .json(&body);
        let result = self.execute_message(request).await;
        self.invalidate_catalog();
        result
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the backend refuses it.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn remove_review(
        &self,
        token: &BearerToken,
        id: ProductId,
        author: &str,
    ) -> Result<String, BackendError> {
        let request = self
            .request(reqwest::Method::DELETE, &format!("api/products/{id}/remove-review"), token)?
            .json(&RemoveReviewRequest { author_name: author });
        let result = self.execute_message(request).await;
        self.invalidate_catalog();
        result
    }

    // =========================================================================
    // Basket, favorites, purchases
    // =========================================================================

    /// The visitor's basket as stored by the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn basket(&self, token: &BearerToken) -> Result<Basket, BackendError> {
        let wire: Vec<WireBasketLine> = self
            .execute(self.get("api/me/basket", Some(token))?)
            .await?;
        Ok(convert_basket(wire))
    }

    /// Replace the backend basket with `basket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, basket), fields(lines = basket.lines().len()))]
    pub async fn sync_basket(
        &self,
        token: &BearerToken,
        basket: &Basket,
    ) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::POST, "api/me/basket", token)?
            .json(basket.lines());
        self.send(request).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn favorites(&self, token: &BearerToken) -> Result<Vec<Product>, BackendError> {
        let wire: Vec<WireProduct> = self
            .execute(self.get("api/me/favorites", Some(token))?)
            .await?;
        Ok(convert_products(wire))
    }

    /// # Errors
    ///
    /// Returns `Rejected` if the product was not added.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn add_favorite(
        &self,
        token: &BearerToken,
        id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::POST, "api/me/favorites", token)?
            .json(&FavoriteRequest { product_id: id });
        self.execute_message(request).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns `Rejected` if the product was not removed.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn remove_favorite(
        &self,
        token: &BearerToken,
        id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::POST, "api/me/favorites/remove", token)?
            .json(&FavoriteRequest { product_id: id });
        self.execute_message(request).await.map(|_| ())
    }

    /// Record a purchase of `product_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, product_ids), fields(count = product_ids.len()))]
    pub async fn purchase(
        &self,
        token: &BearerToken,
        product_ids: Vec<ProductId>,
    ) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::POST, "api/me/purchase", token)?
            .json(&PurchaseRequest {
                purchased_products: product_ids,
            });
        self.execute_message(request).await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn purchased_products(
        &self,
        token: &BearerToken,
    ) -> Result<Vec<ProductId>, BackendError> {
        let ids: PurchasedIds = self
            .execute(self.get("api/me/purchased-products", Some(token))?)
            .await?;
        Ok(ids.into_ids())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn user_info(&self, token: &BearerToken) -> Result<UserInfo, BackendError> {
        self.execute(self.get("api/me/info", Some(token))?).await
    }

    /// Usernames and avatars of every user, for review author avatars.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn all_users(&self, token: &BearerToken) -> Result<Vec<UserSummary>, BackendError> {
        self.execute(self.get("api/me/all-users", Some(token))?).await
    }

    /// Upload a new avatar image as multipart field `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the file.
    #[instrument(skip(self, token, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        token: &BearerToken,
        file_name: String,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BackendError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .request(reqwest::Method::POST, "api/me/avatar", token)?
            .multipart(form);
        self.execute_message(request).await.map(|_| ())
    }

    /// Fetch an avatar image; returns its content type and bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown files, or an error if the request fails.
    #[instrument(skip(self))]
    pub async fn avatar(&self, file: &str) -> Result<(Option<String>, Vec<u8>), BackendError> {
        let path = format!("api/me/avatar/{}", urlencoding::encode(file));
        let response = self.get(&path, None)?.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!("avatar {file}")));
        }
        if !status.is_success() {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: format!("HTTP {status}"),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok((content_type, bytes))
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for wrong credentials.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<BearerToken, BackendError> {
        let request = self
            .inner
            .client
            .post(self.url("api/auth/login")?)
            .json(&LoginRequest {
                email: credentials.email.as_str(),
                password: &credentials.password,
            });
        let response: LoginResponse = self.execute(request).await?;
        if response.access_token.is_empty() {
            return Err(BackendError::Invalid("empty access token".to_string()));
        }
        Ok(BearerToken::new(response.access_token))
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when the username or email is taken.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<String, BackendError> {
        let request = self
            .inner
            .client
            .post(self.url("api/auth/register")?)
            .json(&RegisterRequest {
                username: &registration.username,
                email: registration.credentials.email.as_str(),
                password: &registration.credentials.password,
            });
        self.execute_message(request).await
    }

    /// Backend liveness (`GET /health`).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn health(&self) -> Result<(), BackendError> {
        self.send(self.get("health", None)?).await.map(|_| ())
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %preview(body),
            "Failed to parse backend response"
        );
        BackendError::Parse(e)
    })
}

fn preview(body: &str) -> String {
    body.chars().take(LOG_BODY_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig::new(Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn test_url_joins_api_paths() {
        let c = client("http://localhost:5000");
        assert_eq!(
            c.url("api/products/all_products").unwrap().as_str(),
            "http://localhost:5000/api/products/all_products"
        );
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let c = client("https://example.com/backend");
        assert_eq!(
            c.url("/api/me/info").unwrap().as_str(),
            "https://example.com/backend/api/me/info"
        );
    }

    #[test]
    fn test_parse_body_error_is_parse_variant() {
        let result: Result<Vec<WireProduct>, _> = parse_body("not json");
        assert!(matches!(result, Err(BackendError::Parse(_))));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(2000);
        assert_eq!(preview(&long).len(), LOG_BODY_CHARS);
    }
}
