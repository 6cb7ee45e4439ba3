//! Product store listing: facets, filtering, sorting, pagination and search.
//!
//! Everything here works on borrowed slices of the catalog. A listing is
//! computed in a fixed order:
//!
//! 1. age gate (hide alcohol unless the visitor is a verified adult)
//! 2. facets over what remains
//! 3. the active filter
//! 4. sort
//! 5. pagination

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::age::AgeGate;
use crate::catalog::Product;
use crate::types::PriceBucket;

/// Products shown per store page.
pub const PAGE_SIZE: usize = 12;

/// Minimum query length, in characters, before search suggestions appear.
pub const MIN_SEARCH_CHARS: usize = 2;

/// The single active store filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreFilter {
    #[default]
    All,
    Category(String),
    Price(PriceBucket),
}

impl StoreFilter {
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Category(category) => product.category == *category,
            Self::Price(bucket) => bucket.contains(product.price),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    /// Source order as delivered by the backend.
    #[default]
    Suggested,
    Name,
    Price,
}

impl SortKey {
    pub const ALL: [Self; 3] = [Self::Suggested, Self::Name, Self::Price];

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Suggested => "suggested",
            Self::Name => "name",
            Self::Price => "price",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Suggested => "Suggested",
            Self::Name => "Name",
            Self::Price => "Price",
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.slug() == slug)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Active sort key and direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortState {
    /// The state after the visitor picks `key` from the sort header.
    ///
    /// Re-selecting the active key flips the direction; a different key
    /// starts ascending; Suggested always resets to source order.
    #[must_use]
    pub fn select(self, key: SortKey) -> Self {
        match key {
            SortKey::Suggested => Self::default(),
            _ if key == self.key => Self {
                key,
                direction: self.direction.toggled(),
            },
            _ => Self {
                key,
                direction: SortDirection::Asc,
            },
        }
    }

    /// Stable in-place sort.
    pub fn apply(self, products: &mut [&Product]) {
        let compare: fn(&Product, &Product) -> Ordering = match self.key {
            SortKey::Suggested => return,
            SortKey::Name => compare_names,
            SortKey::Price => |a: &Product, b: &Product| a.price.cmp(&b.price),
        };
        match self.direction {
            SortDirection::Asc => products.sort_by(|a, b| compare(a, b)),
            SortDirection::Desc => products.sort_by(|a, b| compare(b, a)),
        }
    }
}

fn compare_names(a: &Product, b: &Product) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFacet {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFacet {
    pub bucket: PriceBucket,
    pub count: usize,
}

/// Filter dimensions derived from the current product set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facets {
    /// Categories in first-seen order.
    pub categories: Vec<CategoryFacet>,
    /// All seven buckets, including empty ones.
    pub prices: Vec<PriceFacet>,
    pub total: usize,
}

impl Facets {
    #[must_use]
    pub fn from_products(products: &[&Product]) -> Self {
        let mut categories: Vec<CategoryFacet> = Vec::new();
        for product in products {
            match categories.iter_mut().find(|c| c.name == product.category) {
                Some(facet) => facet.count += 1,
                None => categories.push(CategoryFacet {
                    name: product.category.clone(),
                    count: 1,
                }),
            }
        }

        let prices = PriceBucket::ALL
            .into_iter()
            .map(|bucket| PriceFacet {
                bucket,
                count: products.iter().filter(|p| bucket.contains(p.price)).count(),
            })
            .collect();

        Self {
            categories,
            prices,
            total: products.len(),
        }
    }
}

/// Message shown when the grid has nothing to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    Underage,
    NoFavorites,
    NoProducts,
}

impl EmptyState {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Underage => "Underage Notice",
            Self::NoFavorites => "No favorite products found",
            Self::NoProducts => "No products found",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Underage => {
                "You are underage and cannot view alcohol products. \
                 Please wait until you are 18 or older to access these products."
            }
            Self::NoFavorites => {
                "You don't have any favorite products yet, take a look into our products, \
                 you're going to love it."
            }
            Self::NoProducts => {
                "There are no products matching your filters at the moment. \
                 Please check back later."
            }
        }
    }

    /// Pick the empty-state message for a grid with no visible products.
    ///
    /// `filtered_len` counts the source products that match the filter before
    /// the age gate hides anything.
    #[must_use]
    pub const fn select(gate: AgeGate, favorites_view: bool, filtered_len: usize) -> Self {
        if matches!(gate, AgeGate::Underage) && !favorites_view && filtered_len > 0 {
            Self::Underage
        } else if favorites_view && filtered_len == 0 {
            Self::NoFavorites
        } else {
            Self::NoProducts
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped into range.
    pub current: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    /// Page links are only worth showing with more than one page.
    #[must_use]
    pub const fn show_navigation(&self) -> bool {
        self.total_pages > 1
    }
}

/// Slice `items` into fixed-size pages and return page `requested`.
///
/// `requested` is clamped to `1..=max(total_pages, 1)`.
#[must_use]
pub fn paginate<T>(items: Vec<T>, requested: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size);
    let current = requested.clamp(1, total_pages.max(1));
    let items = items
        .into_iter()
        .skip((current - 1) * page_size)
        .take(page_size)
        .collect();
    Page {
        items,
        current,
        total_pages,
    }
}

/// Visitor-controlled listing parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreQuery {
    pub filter: StoreFilter,
    pub sort: SortState,
    pub page: usize,
}

/// Everything the store grid needs to render.
#[derive(Debug, Clone)]
pub struct Listing<'a> {
    pub facets: Facets,
    pub page: Page<&'a Product>,
    /// Set when the current page has no products.
    pub empty_state: Option<EmptyState>,
}

/// Compute a store listing over `source` (the catalog or the favorites subset).
#[must_use]
pub fn browse<'a>(
    source: &'a [Product],
    gate: AgeGate,
    favorites_view: bool,
    query: &StoreQuery,
) -> Listing<'a> {
    let visible: Vec<&Product> = source.iter().filter(|p| gate.permits(p)).collect();
    let facets = Facets::from_products(&visible);

    let mut matching: Vec<&Product> = visible
        .into_iter()
        .filter(|p| query.filter.matches(p))
        .collect();
    query.sort.apply(&mut matching);

    let page = paginate(matching, query.page, PAGE_SIZE);
    let empty_state = page.items.is_empty().then(|| {
        let filtered_len = source.iter().filter(|p| query.filter.matches(p)).count();
        EmptyState::select(gate, favorites_view, filtered_len)
    });

    Listing {
        facets,
        page,
        empty_state,
    }
}

/// Search suggestions: case-insensitive name match, respecting the age gate.
///
/// Queries shorter than [`MIN_SEARCH_CHARS`] return nothing.
#[must_use]
pub fn search<'a>(catalog: &'a [Product], query: &str, gate: AgeGate) -> Vec<&'a Product> {
    if query.chars().count() < MIN_SEARCH_CHARS {
        return Vec::new();
    }
    catalog
        .iter()
        .filter(|p| gate.permits(p) && p.name_matches(query))
        .collect()
}
