//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::filters;
use crate::middleware::Layout;

/// A promotional tile linking into the store.
#[derive(Debug, Clone)]
pub struct Promo {
    pub eyebrow: &'static str,
    pub title: &'static str,
    pub href: &'static str,
}

/// A selling point shown under the promos.
#[derive(Debug, Clone)]
pub struct Highlight {
    pub title: &'static str,
    pub text: &'static str,
}

static PROMOS: [Promo; 3] = [
    Promo {
        eyebrow: "Delicious",
        title: "Salad everyday",
        href: "/store",
    },
    Promo {
        eyebrow: "Fresh",
        title: "Vegetables",
        href: "/store?sort=price&dir=asc",
    },
    Promo {
        eyebrow: "Fresh",
        title: "Week Frenzy",
        href: "/store?price=0-5",
    },
];

static HIGHLIGHTS: [Highlight; 4] = [
    Highlight {
        title: "Healthy Food",
        text: "Picked for flavour and nutrition.",
    },
    Highlight {
        title: "Home Made",
        text: "Prepared by local producers.",
    },
    Highlight {
        title: "100% Natural",
        text: "No artificial additives.",
    },
    Highlight {
        title: "Fast Delivery",
        text: "Free shipping from 20€.",
    },
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub promos: &'static [Promo],
    pub highlights: &'static [Highlight],
}

/// Display the home page.
#[instrument(skip(layout))]
pub async fn index(layout: Layout) -> impl IntoResponse {
    HomeTemplate {
        layout,
        promos: &PROMOS,
        highlights: &HIGHLIGHTS,
    }
}
