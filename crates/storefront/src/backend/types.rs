//! Wire types for backend requests and responses.
//!
//! Responses are deserialized into these schema types first and then
//! converted into `marketmate_core` values, so malformed records are
//! rejected at the boundary instead of leaking into rendering.

use std::fmt;

use marketmate_core::{Basket, BasketLine, Price, Product, ProductId, Rating, Review};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Avatar file the backend serves for users who never uploaded one.
pub const DEFAULT_AVATAR: &str = "user_default.png";

// =============================================================================
// Auth
// =============================================================================

/// Bearer token issued by `POST /api/auth/login`.
///
/// Serializes as a plain string so it can live in the session store;
/// `Debug` never prints it.
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

impl Serialize for BearerToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for BearerToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// Why a backend record was dropped during conversion.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("product {id}: invalid price {price}")]
    InvalidPrice { id: i64, price: f64 },
    #[error("review by {author}: rating {rating} is not a whole number between 1 and 5")]
    InvalidRating { author: String, rating: f64 },
    #[error("basket line for product {id}: invalid quantity {quantity}")]
    InvalidQuantity { id: i64, quantity: i64 },
}

/// A product as served by `/api/products/*`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireProduct {
    #[serde(alias = "_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_alcohol: bool,
    #[serde(default)]
    pub reviews: Vec<WireReview>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireReview {
    #[serde(alias = "Author")]
    pub author: String,
    #[serde(alias = "Rating")]
    pub rating: f64,
    #[serde(default, alias = "Comment")]
    pub comment: Option<String>,
}

impl TryFrom<WireReview> for Review {
    type Error = WireError;

    fn try_from(wire: WireReview) -> Result<Self, Self::Error> {
        let invalid = || WireError::InvalidRating {
            author: wire.author.clone(),
            rating: wire.rating,
        };
        if !wire.rating.is_finite() || wire.rating.fract() != 0.0 {
            return Err(invalid());
        }
        #[allow(clippy::cast_possible_truncation)] // checked whole and finite above
        let rating = Rating::new(wire.rating as i64).map_err(|_| invalid())?;
        Ok(Self {
            author: wire.author,
            rating,
            comment: wire.comment.unwrap_or_default(),
        })
    }
}

impl TryFrom<WireProduct> for Product {
    type Error = WireError;

    /// Reviews that fail validation are dropped with a warning; the product
    /// itself is only rejected for an unusable price.
    fn try_from(wire: WireProduct) -> Result<Self, Self::Error> {
        let price = Price::from_f64(wire.price).ok_or(WireError::InvalidPrice {
            id: wire.id,
            price: wire.price,
        })?;
        let reviews = wire
            .reviews
            .into_iter()
            .filter_map(|review| {
                Review::try_from(review)
                    .map_err(|e| tracing::warn!(product_id = wire.id, "Skipping review: {e}"))
                    .ok()
            })
            .collect();

        Ok(Self {
            id: ProductId::new(wire.id),
            name: wire.name,
            description: wire.description.unwrap_or_default(),
            category: wire.category.unwrap_or_default(),
            price,
            image_url: wire.image_url.unwrap_or_default(),
            is_alcohol: wire.is_alcohol,
            reviews,
        })
    }
}

/// Convert a product list, skipping (and logging) unusable records.
#[must_use]
pub fn convert_products(wire: Vec<WireProduct>) -> Vec<Product> {
    wire.into_iter()
        .filter_map(|product| {
            Product::try_from(product)
                .map_err(|e| tracing::warn!("Skipping product: {e}"))
                .ok()
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct NewReviewRequest<'a> {
    pub rating: u8,
    pub comment: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdateReviewRequest<'a> {
    pub author_name: &'a str,
    pub rating: u8,
    pub comment: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RemoveReviewRequest<'a> {
    pub author_name: &'a str,
}

// =============================================================================
// Account data
// =============================================================================

/// One line of `GET /api/me/basket`. Display fields the backend joins in
/// (name, price, image) are ignored; the catalog is authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBasketLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl TryFrom<WireBasketLine> for BasketLine {
    type Error = WireError;

    fn try_from(wire: WireBasketLine) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(wire.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(WireError::InvalidQuantity {
                id: wire.product_id,
                quantity: wire.quantity,
            })?;
        Ok(Self {
            product_id: ProductId::new(wire.product_id),
            quantity,
        })
    }
}

/// Build a basket from backend lines, dropping non-positive quantities.
#[must_use]
pub fn convert_basket(wire: Vec<WireBasketLine>) -> Basket {
    Basket::from_lines(wire.into_iter().filter_map(|line| {
        BasketLine::try_from(line)
            .map_err(|e| tracing::warn!("Skipping basket line: {e}"))
            .ok()
    }))
}

#[derive(Debug, Serialize)]
pub struct FavoriteRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Serialize)]
pub struct PurchaseRequest {
    pub purchased_products: Vec<ProductId>,
}

/// `GET /api/me/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserInfo {
    /// Avatar file name, falling back to the backend's default image.
    #[must_use]
    pub fn avatar_file(&self) -> &str {
        avatar_or_default(self.avatar.as_deref())
    }
}

/// One entry of `GET /api/me/all-users`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSummary {
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserSummary {
    #[must_use]
    pub fn avatar_file(&self) -> &str {
        avatar_or_default(self.avatar.as_deref())
    }
}

fn avatar_or_default(avatar: Option<&str>) -> &str {
    avatar
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_AVATAR)
}

/// The purchased-products column defaults to an empty string for users who
/// have never bought anything; treat that as an empty list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PurchasedIds {
    Ids(Vec<i64>),
    Text(String),
}

impl PurchasedIds {
    #[must_use]
    pub fn into_ids(self) -> Vec<ProductId> {
        match self {
            Self::Ids(ids) => ids.into_iter().map(ProductId::new).collect(),
            Self::Text(text) => text
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect(),
        }
    }
}

/// `{"message": ..}` / `{"error": ..}` envelope used by every mutation.
///
/// `msg` is what the token layer uses for 401/422 rejections.
#[derive(Debug, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ApiMessage {
    /// Parse a body leniently; non-JSON bodies yield an empty envelope.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// The most specific human-readable text in the envelope.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_accepts_legacy_field_names() {
        let json = r#"{
            "_id": 7, "name": "Stout", "description": null, "price": 4.5,
            "category": "Drinks", "image_url": "stout.png", "is_alcohol": true,
            "reviews": [{"id": 1, "product_id": 7, "Author": "ana", "Rating": 4.0, "Comment": null}]
        }"#;
        let wire: WireProduct = serde_json::from_str(json).unwrap();
        let product = Product::try_from(wire).unwrap();
        assert_eq!(product.id, ProductId::new(7));
        assert_eq!(product.price.to_string(), "4.50€");
        assert!(product.is_alcohol);
        assert_eq!(product.reviews.len(), 1);
        assert_eq!(product.reviews[0].author, "ana");
        assert_eq!(product.reviews[0].rating.get(), 4);
        assert!(product.reviews[0].comment.is_empty());
    }

    #[test]
    fn test_out_of_range_review_is_dropped() {
        let json = r#"{"id": 1, "name": "Tea", "price": 3.0, "reviews": [
            {"author": "a", "rating": 6.0},
            {"author": "b", "rating": 2.5},
            {"author": "c", "rating": 5.0, "comment": "great"}
        ]}"#;
        let wire: WireProduct = serde_json::from_str(json).unwrap();
        let product = Product::try_from(wire).unwrap();
        assert_eq!(product.reviews.len(), 1);
        assert_eq!(product.reviews[0].author, "c");
        assert_eq!(product.reviews[0].comment, "great");
    }

    #[test]
    fn test_negative_price_rejects_product() {
        let wire: WireProduct =
            serde_json::from_str(r#"{"id": 2, "name": "Odd", "price": -1.0}"#).unwrap();
        assert_eq!(
            Product::try_from(wire),
            Err(WireError::InvalidPrice { id: 2, price: -1.0 })
        );
    }

    #[test]
    fn test_basket_drops_non_positive_quantities() {
        let wire: Vec<WireBasketLine> = serde_json::from_str(
            r#"[
                {"product_id": 1, "quantity": 2, "name": "Tea", "price": 3.0, "image_url": "x"},
                {"product_id": 2, "quantity": 0},
                {"product_id": 3, "quantity": -4}
            ]"#,
        )
        .unwrap();
        let basket = convert_basket(wire);
        assert_eq!(basket.lines().len(), 1);
        assert_eq!(basket.quantity_of(ProductId::new(1)), 2);
    }

    #[test]
    fn test_purchased_ids_accepts_empty_string() {
        let empty: PurchasedIds = serde_json::from_str(r#""""#).unwrap();
        assert!(empty.into_ids().is_empty());
        let ids: PurchasedIds = serde_json::from_str("[3, 5]").unwrap();
        assert_eq!(ids.into_ids(), vec![ProductId::new(3), ProductId::new(5)]);
    }

    #[test]
    fn test_user_info_default_avatar() {
        let info: UserInfo = serde_json::from_str(r#"{"username": "ana"}"#).unwrap();
        assert_eq!(info.avatar_file(), DEFAULT_AVATAR);
        let info: UserInfo =
            serde_json::from_str(r#"{"username": "ana", "avatar": "ana.png"}"#).unwrap();
        assert_eq!(info.avatar_file(), "ana.png");
    }

    #[test]
    fn test_api_message_prefers_error() {
        let msg = ApiMessage::parse(r#"{"error": "Email already exists"}"#);
        assert_eq!(msg.text(), Some("Email already exists"));
        let msg = ApiMessage::parse(r#"{"msg": "Token has expired"}"#);
        assert_eq!(msg.text(), Some("Token has expired"));
        assert!(ApiMessage::parse("<html>").text().is_none());
    }

    #[test]
    fn test_bearer_token_is_redacted() {
        let token = BearerToken::new("eyJ.secret.sig");
        assert!(!format!("{token:?}").contains("secret"));
        let json = serde_json::to_string(&token).unwrap();
        let back: BearerToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "eyJ.secret.sig");
    }
}
