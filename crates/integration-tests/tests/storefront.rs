//! End-to-end storefront tests.
//!
//! Every test spawns its own storefront and fake backend, so they run in
//! parallel without shared state. Credential posts are rate limited per
//! app, so no test logs in more than a handful of times.
//!
//! Run with: cargo test -p marketmate-integration-tests

use marketmate_integration_tests::{
    APPLE, CHEDDAR, MERLOT, OTHER_REVIEW_COMMENT, OTHER_REVIEWER, RecordedReview, SOURDOUGH,
    TestApp, USERNAME, location,
};
use marketmate_storefront::routes::age::{ADULT_MESSAGE, INVALID_DATE_MESSAGE};
use marketmate_storefront::routes::cart::{FREE_SHIPPING_NOTE, STALE_BASKET_MESSAGE};
use marketmate_storefront::routes::reviews::DELETE_CONFIRMATION;
use reqwest::StatusCode;

fn checkout_fields(street: &str) -> Vec<(&str, &str)> {
    vec![
        ("street", street),
        ("city", "Lisbon"),
        ("postalCode", "1000-001"),
        ("cardNumber", "4111111111111111"),
        ("nameOnCard", "Ana Silva"),
        ("expiration", "12/30"),
        ("cvv", "123"),
    ]
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_endpoints_report_ok() {
    let app = TestApp::spawn().await;

    let live = app.get("/health").await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(live.text().await.expect("body"), "ok");

    let ready = app.get("/health/ready").await;
    assert_eq!(ready.status(), StatusCode::OK);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn login_shows_username_in_header() {
    let app = TestApp::spawn().await;
    app.login().await;

    let home = app.get_text("/").await;
    assert!(home.contains(USERNAME), "header should show the username");
    assert!(home.contains("Welcome, ana!"));
}

#[tokio::test]
async fn wrong_password_flashes_generic_error() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/auth/login",
            &[("email", "ana@example.com"), ("password", "wrong-password")],
        )
        .await;
    assert_eq!(location(&response), Some("/auth"));

    let page = app.get_text("/auth").await;
    assert!(page.contains("Invalid username or password"));
}

#[tokio::test]
async fn register_then_log_in_as_new_user() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/auth/register",
            &[
                ("username", "bruno"),
                ("email", "bruno@example.com"),
                ("password", "hunter22"),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/auth"));
    assert!(
        app.get_text("/auth")
            .await
            .contains("Registration successful. Please log in.")
    );

    let response = app
        .post_form(
            "/auth/login",
            &[("email", "bruno@example.com"), ("password", "hunter22")],
        )
        .await;
    assert_eq!(location(&response), Some("/"));
    assert!(app.get_text("/").await.contains("bruno"));
}

#[tokio::test]
async fn duplicate_registration_shows_backend_message() {
    let app = TestApp::spawn().await;

    app.post_form(
        "/auth/register",
        &[
            ("username", USERNAME),
            ("email", "other@example.com"),
            ("password", "hunter22"),
        ],
    )
    .await;

    let page = app.get_text("/auth?mode=register").await;
    assert!(page.contains("Username already taken"));
    assert_eq!(app.backend.state().users.len(), 1);
}

#[tokio::test]
async fn logout_forgets_the_user() {
    let app = TestApp::spawn().await;
    app.login().await;

    let response = app.post_form("/auth/logout", &[]).await;
    assert_eq!(location(&response), Some("/"));

    let checkout = app.get("/checkout").await;
    assert_eq!(location(&checkout), Some("/auth"));
}

#[tokio::test]
async fn protected_redirect_keeps_pending_notice() {
    let app = TestApp::spawn().await;
    app.verify_age("01-01-1980").await;

    let checkout = app.get("/checkout").await;
    assert_eq!(location(&checkout), Some("/auth"));

    let page = app.get_text("/auth").await;
    assert!(page.contains(ADULT_MESSAGE), "notice lost on the redirect");
}

#[tokio::test]
async fn protected_pages_redirect_anonymous_visitors() {
    let app = TestApp::spawn().await;

    for path in ["/checkout", "/store/favs", "/account"] {
        let response = app.get(path).await;
        assert!(response.status().is_redirection(), "{path} should redirect");
        assert_eq!(location(&response), Some("/auth"), "{path}");
    }
}

// ============================================================================
// Basket and checkout
// ============================================================================

#[tokio::test]
async fn anonymous_add_to_cart_goes_to_login() {
    let app = TestApp::spawn().await;

    let id = APPLE.to_string();
    let response = app
        .post_form("/cart/add", &[("product_id", id.as_str()), ("quantity", "1")])
        .await;

    assert_eq!(location(&response), Some("/auth"));
    assert!(app.backend.state().basket_posts.is_empty());
}

#[tokio::test]
async fn add_to_cart_pushes_whole_basket() {
    let app = TestApp::spawn().await;
    app.login().await;

    let apple = APPLE.to_string();
    let bread = SOURDOUGH.to_string();
    app.post_form("/cart/add", &[("product_id", apple.as_str()), ("quantity", "2")])
        .await;
    app.post_form("/cart/add", &[("product_id", bread.as_str())]).await;

    let state = app.backend.state();
    assert_eq!(state.basket_posts.len(), 2);
    assert_eq!(
        state.basket_posts.last(),
        Some(&vec![(APPLE, 2), (SOURDOUGH, 1)])
    );
}

#[tokio::test]
async fn checkout_quantity_buttons_update_basket() {
    let app = TestApp::spawn().await;
    app.login().await;

    let id = CHEDDAR.to_string();
    app.post_form("/cart/add", &[("product_id", id.as_str())]).await;
    app.post_form("/checkout/quantity", &[("product_id", id.as_str()), ("delta", "1")])
        .await;
    assert_eq!(
        app.backend.state().basket_posts.last(),
        Some(&vec![(CHEDDAR, 2)])
    );

    app.post_form("/checkout/remove", &[("product_id", id.as_str())])
        .await;
    assert_eq!(app.backend.state().basket_posts.last(), Some(&vec![]));
}

#[tokio::test]
async fn checkout_with_missing_field_sends_nothing() {
    let app = TestApp::spawn().await;
    app.login().await;

    let id = APPLE.to_string();
    app.post_form("/cart/add", &[("product_id", id.as_str())]).await;

    let response = app.post_form("/checkout", &checkout_fields("")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.expect("body");
    assert!(page.contains("Please fill all fields"));

    assert!(app.backend.state().purchases.is_empty());
}

#[tokio::test]
async fn checkout_purchases_basket_and_empties_it() {
    let app = TestApp::spawn().await;
    app.login().await;

    let apple = APPLE.to_string();
    let cheese = CHEDDAR.to_string();
    app.post_form("/cart/add", &[("product_id", apple.as_str()), ("quantity", "3")])
        .await;
    app.post_form("/cart/add", &[("product_id", cheese.as_str())]).await;

    let response = app
        .post_form("/checkout", &checkout_fields("Rua Augusta 1"))
        .await;
    assert_eq!(location(&response), Some("/"));

    let state = app.backend.state();
    assert_eq!(state.purchases.len(), 1);
    let mut bought = state.purchases.first().cloned().expect("one purchase");
    bought.sort_unstable();
    bought.dedup();
    assert_eq!(bought, vec![APPLE, CHEDDAR]);
    assert_eq!(state.basket_posts.last(), Some(&vec![]));
}

#[tokio::test]
async fn failed_sync_keeps_session_basket_at_checkout() {
    let app = TestApp::spawn().await;
    app.login().await;

    let apple = APPLE.to_string();
    let cheese = CHEDDAR.to_string();
    app.post_form("/cart/add", &[("product_id", apple.as_str())]).await;
    app.backend.state().fail_basket_sync = true;
    app.post_form("/cart/add", &[("product_id", cheese.as_str())]).await;

    assert!(app.get_text("/store").await.contains("Failed to add item to cart."));
    assert_eq!(app.backend.state().basket_posts.len(), 1);

    let page = app.get_text("/checkout").await;
    assert!(page.contains("Apple"));
    assert!(page.contains("Cheddar"), "checkout reverted to the backend copy");
}

#[tokio::test]
async fn purchase_with_failed_clear_empties_local_basket_and_says_so() {
    let app = TestApp::spawn().await;
    app.login().await;

    let id = CHEDDAR.to_string();
    app.post_form("/cart/add", &[("product_id", id.as_str())]).await;
    app.backend.state().fail_basket_sync = true;

    let response = app
        .post_form("/checkout", &checkout_fields("Rua Augusta 1"))
        .await;
    assert_eq!(location(&response), Some("/"));
    assert!(app.get_text("/").await.contains(STALE_BASKET_MESSAGE));

    let state = app.backend.state();
    assert_eq!(state.purchases, vec![vec![CHEDDAR]]);
    assert_eq!(state.baskets.get(USERNAME), Some(&vec![(CHEDDAR, 1)]));
    drop(state);

    let page = app.get_text("/checkout").await;
    assert!(!page.contains("Cheddar"));
}

#[tokio::test]
async fn free_shipping_resets_after_purchase() {
    let app = TestApp::spawn().await;
    app.login().await;

    let cheese = CHEDDAR.to_string();
    app.post_form("/cart/add", &[("product_id", cheese.as_str()), ("quantity", "4")])
        .await;
    let page = app.get_text("/checkout").await;
    assert!(!page.contains(FREE_SHIPPING_NOTE), "26.00€ ships free");

    let response = app
        .post_form("/checkout", &checkout_fields("Rua Augusta 1"))
        .await;
    assert_eq!(location(&response), Some("/"));

    let apple = APPLE.to_string();
    app.post_form("/cart/add", &[("product_id", apple.as_str())]).await;
    let page = app.get_text("/checkout").await;
    assert!(page.contains(FREE_SHIPPING_NOTE));
    assert!(page.contains("5.00€"));
}

#[tokio::test]
async fn checkout_shows_free_shipping_note_and_totals() {
    let app = TestApp::spawn().await;
    app.login().await;

    let id = SOURDOUGH.to_string();
    app.post_form("/cart/add", &[("product_id", id.as_str())]).await;

    let page = app.get_text("/checkout").await;
    assert!(page.contains("Sourdough"));
    assert!(page.contains("Free shipment if your purchase is 20€ or more."));
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
async fn review_carries_its_comment() {
    let app = TestApp::spawn().await;
    app.login().await;

    let path = format!("/products/{SOURDOUGH}/reviews");
    let response = app
        .post_form(&path, &[("rating", "4"), ("comment", "Great crust")])
        .await;
    assert_eq!(
        location(&response),
        Some(format!("/products/{SOURDOUGH}").as_str())
    );

    assert_eq!(
        app.backend.state().reviews,
        vec![RecordedReview {
            product_id: SOURDOUGH,
            username: USERNAME.to_string(),
            rating: 4,
            comment: "Great crust".to_string(),
        }]
    );

    let page = app.get_text(&format!("/products/{SOURDOUGH}")).await;
    assert!(page.contains("Great crust"));
}

#[tokio::test]
async fn review_requires_a_purchase() {
    let app = TestApp::spawn().await;
    app.login().await;

    let path = format!("/products/{APPLE}/reviews");
    app.post_form(&path, &[("rating", "5"), ("comment", "Crisp")])
        .await;

    assert!(app.backend.state().reviews.is_empty());
}

#[tokio::test]
async fn other_authors_reviews_have_no_manage_links() {
    let app = TestApp::spawn().await;
    app.login().await;

    let page = app.get_text(&format!("/products/{SOURDOUGH}")).await;
    assert!(page.contains(OTHER_REVIEW_COMMENT));
    assert!(!page.contains(&format!("/products/{SOURDOUGH}/reviews/edit")));
    assert!(!page.contains(&format!("/products/{SOURDOUGH}/reviews/delete")));
}

#[tokio::test]
async fn non_author_cannot_change_a_review() {
    let app = TestApp::spawn().await;
    app.login().await;
    let seeded = app.backend.state().product_reviews(SOURDOUGH);

    let edit = format!("/products/{SOURDOUGH}/reviews/edit");
    let response = app
        .post_form(&edit, &[("rating", "1"), ("comment", "Hijacked")])
        .await;
    assert_eq!(
        location(&response),
        Some(format!("/products/{SOURDOUGH}").as_str())
    );
    let page = app.get_text(&format!("/products/{SOURDOUGH}")).await;
    assert!(page.contains("You can only change your own review."));

    let delete = format!("/products/{SOURDOUGH}/reviews/delete");
    app.post_form(&delete, &[]).await;
    assert_eq!(app.get(&delete).await.status(), StatusCode::SEE_OTHER);

    let reviews = app.backend.state().product_reviews(SOURDOUGH);
    assert_eq!(reviews, seeded);
    assert_eq!(reviews[0]["author"], OTHER_REVIEWER);
}

#[tokio::test]
async fn author_edits_then_deletes_own_review() {
    let app = TestApp::spawn().await;
    app.login().await;

    let product = format!("/products/{SOURDOUGH}");
    app.post_form(
        &format!("{product}/reviews"),
        &[("rating", "4"), ("comment", "Great crust")],
    )
    .await;

    let page = app.get_text(&product).await;
    assert!(page.contains(&format!("{product}/reviews/edit")));

    let edit_form = app.get_text(&format!("{product}/reviews/edit")).await;
    assert!(edit_form.contains("Great crust"));

    app.post_form(
        &format!("{product}/reviews/edit"),
        &[("rating", "5"), ("comment", "Even better toasted")],
    )
    .await;
    let own = |reviews: Vec<serde_json::Value>| {
        reviews.into_iter().find(|r| r["author"] == USERNAME)
    };
    let updated = own(app.backend.state().product_reviews(SOURDOUGH)).expect("own review");
    assert_eq!(updated["rating"], 5);
    assert_eq!(updated["comment"], "Even better toasted");

    let confirm = app.get_text(&format!("{product}/reviews/delete")).await;
    assert!(confirm.contains(DELETE_CONFIRMATION));
    assert!(confirm.contains("Even better toasted"));

    let response = app.post_form(&format!("{product}/reviews/delete"), &[]).await;
    assert_eq!(location(&response), Some(product.as_str()));
    let reviews = app.backend.state().product_reviews(SOURDOUGH);
    assert!(own(reviews.clone()).is_none());
    assert_eq!(reviews.len(), 1, "other reviews are untouched");
}

#[tokio::test]
async fn review_without_rating_is_not_sent() {
    let app = TestApp::spawn().await;
    app.login().await;

    let path = format!("/products/{SOURDOUGH}/reviews");
    app.post_form(&path, &[("rating", ""), ("comment", "No stars")])
        .await;

    assert!(app.backend.state().reviews.is_empty());
}

// ============================================================================
// Age gate and catalog
// ============================================================================

#[tokio::test]
async fn undecided_visitors_see_no_alcohol() {
    let app = TestApp::spawn().await;

    let store = app.get_text("/store").await;
    assert!(store.contains("Apple"));
    assert!(!store.contains("Merlot"));
}

#[tokio::test]
async fn underage_visitors_never_see_alcohol() {
    let app = TestApp::spawn().await;
    app.verify_age("01-01-2020").await;

    let store = app.get_text("/store").await;
    assert!(store.contains("Cheddar"));
    assert!(!store.contains("Merlot"));

    let search = app.get_text("/search?q=mer").await;
    assert!(!search.contains("Merlot"));

    let detail = app.get(&format!("/products/{MERLOT}")).await;
    assert_eq!(location(&detail), Some("/store"));
}

#[tokio::test]
async fn adults_see_alcohol() {
    let app = TestApp::spawn().await;
    app.verify_age("01-01-1980").await;

    let store = app.get_text("/store").await;
    assert!(store.contains("Merlot"));

    let detail = app.get(&format!("/products/{MERLOT}")).await;
    assert_eq!(detail.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_birth_date_counts_as_underage() {
    let app = TestApp::spawn().await;
    app.verify_age("1980-01-01").await;

    let store = app.get_text("/store").await;
    assert!(store.contains(INVALID_DATE_MESSAGE));
    assert!(!store.contains("Merlot"));

    app.verify_age("01-01-1980").await;
    assert!(!app.get_text("/store").await.contains("Merlot"));
}

#[tokio::test]
async fn age_decision_cannot_be_changed() {
    let app = TestApp::spawn().await;
    app.verify_age("01-01-2015").await;
    app.verify_age("01-01-1980").await;

    let store = app.get_text("/store").await;
    assert!(!store.contains("Merlot"));
    assert!(!store.contains(ADULT_MESSAGE));

    let detail = app.get(&format!("/products/{MERLOT}")).await;
    assert_eq!(location(&detail), Some("/store"));
}

#[tokio::test]
async fn category_filter_limits_listing() {
    let app = TestApp::spawn().await;

    let store = app.get_text("/store?category=Fruit").await;
    assert!(store.contains("Apple"));
    assert!(!store.contains("Sourdough"));
}

#[tokio::test]
async fn search_needs_two_characters() {
    let app = TestApp::spawn().await;

    let results = app.get_text("/search?q=ch").await;
    assert!(results.contains("Cheddar"));

    let too_short = app.get_text("/search?q=c").await;
    assert!(!too_short.contains("Cheddar"));
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app.get("/products/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_detail_page_keeps_pending_notice() {
    let app = TestApp::spawn().await;
    app.verify_age("01-01-1980").await;

    let response = app.get("/products/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(app.get_text("/store").await.contains(ADULT_MESSAGE));
}

// ============================================================================
// Favorites
// ============================================================================

#[tokio::test]
async fn favorites_page_lists_added_products() {
    let app = TestApp::spawn().await;
    app.login().await;

    let id = CHEDDAR.to_string();
    app.post_form(
        "/favorites/toggle",
        &[("product_id", id.as_str()), ("action", "add")],
    )
    .await;

    let favs = app.get_text("/store/favs").await;
    assert!(favs.contains("Cheddar"));
    assert!(!favs.contains("Apple"));
}
