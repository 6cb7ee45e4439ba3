//! Search route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use marketmate_core::Product;
use marketmate_core::store::{self, MIN_SEARCH_CHARS};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::Layout;
use crate::models::Flash;
use crate::models::session as session_data;
use crate::state::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// One search suggestion.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
}

impl From<&Product> for SearchResult {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            image_url: product.image_url.clone(),
        }
    }
}

/// Search page template.
#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub layout: Layout,
    pub query: String,
    /// The query is long enough to search.
    pub searched: bool,
    pub results: Vec<SearchResult>,
}

/// Product name search.
///
/// Alcohol products only appear for verified adults.
#[instrument(skip(state, session, layout))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    mut layout: Layout,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let q = query.q.trim().to_string();
    let searched = q.chars().count() >= MIN_SEARCH_CHARS;

    let results = if searched {
        match state.backend().all_products().await {
            Ok(catalog) => {
                let gate = session_data::age_gate(&session).await;
                store::search(&catalog, &q, gate)
                    .into_iter()
                    .map(SearchResult::from)
                    .collect()
            }
            Err(e) => {
                tracing::error!("Failed to load catalog for search: {e}");
                layout = layout.with_flash(Flash::error("Search is unavailable right now."));
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    SearchTemplate {
        layout,
        query: q,
        searched,
        results,
    }
}
