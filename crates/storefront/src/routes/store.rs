//! Product store route handlers.
//!
//! The store renders one listing computed by `marketmate_core::store::browse`
//! over either the full catalog or the visitor's favorites. All listing state
//! (filter, sort, page) lives in the query string so every view is linkable.

use std::collections::HashSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use marketmate_core::store::{self, EmptyState, Facets, Listing, Page};
use marketmate_core::{
    AgeGate, PriceBucket, Product, ProductId, SortDirection, SortKey, SortState, StoreFilter,
    StoreQuery,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{Layout, OptionalAuth, RequireAuth};
use crate::models::session as session_data;
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

pub const STORE_PATH: &str = "/store";
pub const FAVORITES_PATH: &str = "/store/favs";

// =============================================================================
// Query parameters
// =============================================================================

/// Raw listing parameters. Unknown or malformed values fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct StoreParams {
    pub category: Option<String>,
    pub price: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub page: Option<String>,
}

impl StoreParams {
    /// Interpret the parameters as a listing query.
    ///
    /// A category wins over a price bucket when both are present.
    #[must_use]
    pub fn to_query(&self) -> StoreQuery {
        let filter = match (non_empty(self.category.as_deref()), non_empty(self.price.as_deref()))
        {
            (Some(category), _) => StoreFilter::Category(category.to_string()),
            (None, Some(slug)) => {
                PriceBucket::from_slug(slug).map_or(StoreFilter::All, StoreFilter::Price)
            }
            (None, None) => StoreFilter::All,
        };

        let key = self
            .sort
            .as_deref()
            .and_then(SortKey::from_slug)
            .unwrap_or_default();
        let direction = match key {
            SortKey::Suggested => SortDirection::Asc,
            _ => self
                .dir
                .as_deref()
                .and_then(SortDirection::from_slug)
                .unwrap_or_default(),
        };

        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1);

        StoreQuery {
            filter,
            sort: SortState { key, direction },
            page,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Build a listing URL. Default values are omitted to keep links short.
#[must_use]
pub fn listing_href(base: &str, filter: &StoreFilter, sort: SortState, page: usize) -> String {
    let mut params: Vec<String> = Vec::new();
    match filter {
        StoreFilter::All => {}
        StoreFilter::Category(category) => {
            params.push(format!("category={}", urlencoding::encode(category)));
        }
        StoreFilter::Price(bucket) => params.push(format!("price={}", bucket.slug())),
    }
    if sort.key != SortKey::Suggested {
        params.push(format!("sort={}", sort.key.slug()));
        params.push(format!("dir={}", sort.direction.slug()));
    }
    if page > 1 {
        params.push(format!("page={page}"));
    }

    if params.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", params.join("&"))
    }
}

// =============================================================================
// Views
// =============================================================================

/// Product card display data for templates.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub image_url: String,
    pub is_alcohol: bool,
    pub average_rating: String,
    pub review_count: usize,
    pub is_favorite: bool,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, is_favorite: bool) -> Self {
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
            is_favorite,
        }
    }
}

/// Sidebar filter entry.
#[derive(Debug, Clone)]
pub struct FilterLink {
    pub label: String,
    pub count: usize,
    pub href: String,
    pub active: bool,
}

/// Sort header entry.
#[derive(Debug, Clone)]
pub struct SortLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
    /// Direction indicator for the active key.
    pub arrow: &'static str,
}

#[derive(Debug, Clone)]
pub struct PageLink {
    pub number: usize,
    pub href: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PaginationView {
    pub show: bool,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub pages: Vec<PageLink>,
}

impl PaginationView {
    fn new(base: &str, query: &StoreQuery, page: &Page<&Product>) -> Self {
        let href = |n: usize| listing_href(base, &query.filter, query.sort, n);
        Self {
            show: page.show_navigation(),
            previous: page.has_previous().then(|| href(page.current - 1)),
            next: page.has_next().then(|| href(page.current + 1)),
            pages: (1..=page.total_pages)
                .map(|number| PageLink {
                    number,
                    href: href(number),
                    current: number == page.current,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmptyView {
    pub title: &'static str,
    pub message: &'static str,
}

impl From<EmptyState> for EmptyView {
    fn from(state: EmptyState) -> Self {
        Self {
            title: state.title(),
            message: state.message(),
        }
    }
}

/// Store page template.
#[derive(Template, WebTemplate)]
#[template(path = "store/index.html")]
pub struct StoreTemplate {
    pub layout: Layout,
    pub heading: &'static str,
    pub favorites_view: bool,
    pub all_link: FilterLink,
    pub categories: Vec<FilterLink>,
    pub prices: Vec<FilterLink>,
    pub sorts: Vec<SortLink>,
    pub products: Vec<ProductCard>,
    pub empty: Option<EmptyView>,
    pub pagination: PaginationView,
    pub show_age_prompt: bool,
    /// Current listing URL, for forms that come back here.
    pub return_to: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the product store.
#[instrument(skip(state, session, layout, user))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    mut layout: Layout,
    OptionalAuth(user): OptionalAuth,
    Query(params): Query<StoreParams>,
) -> Response {
    let catalog = match state.backend().all_products().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Failed to load catalog: {e}");
            layout = layout.with_flash(Flash::error("Failed to load products."));
            Default::default()
        }
    };

    let favorite_ids = match &user {
        Some(user) => favorite_ids(&state, user).await,
        None => HashSet::new(),
    };

    let gate = session_data::age_gate(&session).await;
    let query = params.to_query();
    let listing = store::browse(&catalog, gate, false, &query);

    render(layout, STORE_PATH, gate, &query, &listing, &favorite_ids).into_response()
}

/// Display the favorites store.
#[instrument(skip(state, session, layout, user))]
pub async fn favorites(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    mut layout: Layout,
    Query(params): Query<StoreParams>,
) -> Response {
    let favorites = match state.backend().favorites(&user.token).await {
        Ok(favorites) => favorites,
        Err(e) => {
            tracing::warn!("Failed to load favorites for {}: {e}", user.username);
            layout = layout.with_flash(Flash::error("Failed to load your favorites."));
            Vec::new()
        }
    };
    let favorite_ids: HashSet<ProductId> = favorites.iter().map(|p| p.id).collect();

    let gate = session_data::age_gate(&session).await;
    let query = params.to_query();
    let listing = store::browse(&favorites, gate, true, &query);

    render(layout, FAVORITES_PATH, gate, &query, &listing, &favorite_ids).into_response()
}

/// Ids of the visitor's favorites, for the heart toggle on each card.
async fn favorite_ids(state: &AppState, user: &CurrentUser) -> HashSet<ProductId> {
    match state.backend().favorites(&user.token).await {
        Ok(products) => products.iter().map(|p| p.id).collect(),
        Err(e) => {
            tracing::warn!("Failed to load favorites for {}: {e}", user.username);
            HashSet::new()
        }
    }
}

fn render(
    layout: Layout,
    base: &str,
    gate: AgeGate,
    query: &StoreQuery,
    listing: &Listing<'_>,
    favorite_ids: &HashSet<ProductId>,
) -> StoreTemplate {
    let (all_link, categories, prices) = filter_links(base, &query.filter, &listing.facets);

    let sorts = SortKey::ALL
        .into_iter()
        .map(|key| {
            let active = query.sort.key == key;
            SortLink {
                label: key.label(),
                href: listing_href(base, &query.filter, query.sort.select(key), query.page),
                active,
                arrow: match (active, key, query.sort.direction) {
                    (false, _, _) | (true, SortKey::Suggested, _) => "",
                    (true, _, SortDirection::Asc) => "↑",
                    (true, _, SortDirection::Desc) => "↓",
                },
            }
        })
        .collect();

    let favorites_view = base == FAVORITES_PATH;

    StoreTemplate {
        layout,
        heading: if favorites_view { "Your Favorites" } else { "Store" },
        favorites_view,
        all_link,
        categories,
        prices,
        sorts,
        products: listing
            .page
            .items
            .iter()
            .map(|p| ProductCard::new(p, favorite_ids.contains(&p.id)))
            .collect(),
        empty: listing.empty_state.map(EmptyView::from),
        pagination: PaginationView::new(base, query, &listing.page),
        show_age_prompt: !gate.is_decided(),
        return_to: listing_href(base, &query.filter, query.sort, listing.page.current),
    }
}

/// Sidebar links. Choosing a filter resets sort and page.
fn filter_links(
    base: &str,
    active: &StoreFilter,
    facets: &Facets,
) -> (FilterLink, Vec<FilterLink>, Vec<FilterLink>) {
    let link = |filter: StoreFilter, label: String, count: usize| FilterLink {
        label,
        count,
        href: listing_href(base, &filter, SortState::default(), 1),
        active: *active == filter,
    };

    let all = link(StoreFilter::All, "All".to_string(), facets.total);
    let categories = facets
        .categories
        .iter()
        .map(|c| link(StoreFilter::Category(c.name.clone()), c.name.clone(), c.count))
        .collect();
    let prices = facets
        .prices
        .iter()
        .map(|p| link(StoreFilter::Price(p.bucket), p.bucket.label().to_string(), p.count))
        .collect();

    (all, categories, prices)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> StoreParams {
        let mut p = StoreParams::default();
        for (key, value) in pairs {
            let value = Some((*value).to_string());
            match *key {
                "category" => p.category = value,
                "price" => p.price = value,
                "sort" => p.sort = value,
                "dir" => p.dir = value,
                "page" => p.page = value,
                _ => {}
            }
        }
        p
    }

    #[test]
    fn test_defaults() {
        let query = StoreParams::default().to_query();
        assert_eq!(query.filter, StoreFilter::All);
        assert_eq!(query.sort, SortState::default());
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_category_beats_price() {
        let query = params(&[("category", "Bakery"), ("price", "0-5")]).to_query();
        assert_eq!(query.filter, StoreFilter::Category("Bakery".to_string()));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let query = params(&[("price", "cheap"), ("sort", "color"), ("page", "two")]).to_query();
        assert_eq!(query.filter, StoreFilter::All);
        assert_eq!(query.sort.key, SortKey::Suggested);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_suggested_ignores_direction() {
        let query = params(&[("sort", "suggested"), ("dir", "desc")]).to_query();
        assert_eq!(query.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_listing_href() {
        assert_eq!(
            listing_href(STORE_PATH, &StoreFilter::All, SortState::default(), 1),
            "/store"
        );
        let sort = SortState {
            key: SortKey::Price,
            direction: SortDirection::Desc,
        };
        assert_eq!(
            listing_href(
                STORE_PATH,
                &StoreFilter::Category("Fresh Fruit".to_string()),
                sort,
                3
            ),
            "/store?category=Fresh%20Fruit&sort=price&dir=desc&page=3"
        );
        assert_eq!(
            listing_href(
                FAVORITES_PATH,
                &StoreFilter::Price(PriceBucket::Over200),
                SortState::default(),
                1
            ),
            "/store/favs?price=200-plus"
        );
    }

    #[test]
    fn test_href_round_trips_through_params() {
        let sort = SortState {
            key: SortKey::Name,
            direction: SortDirection::Desc,
        };
        let filter = StoreFilter::Price(PriceBucket::UpTo20);
        let href = listing_href(STORE_PATH, &filter, sort, 2);
        let query_string = href.split_once('?').unwrap().1;
        let parsed: StoreParams = parse_query(query_string);
        let query = parsed.to_query();
        assert_eq!(query.filter, filter);
        assert_eq!(query.sort, sort);
        assert_eq!(query.page, 2);
    }

    fn parse_query(query: &str) -> StoreParams {
        let pairs: Vec<(String, String)> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), urlencoding::decode(v).unwrap().into_owned()))
            .collect();
        let borrowed: Vec<(&str, &str)> =
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        params(&borrowed)
    }
}
