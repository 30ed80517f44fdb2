//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                  - Liveness
//! GET  /health/ready                            - Readiness (database)
//!
//! # Listings
//! GET    /api/products                          - Search active listings
//! POST   /api/products                          - Create listing (store owner)
//! GET    /api/products/{id}                     - Listing with images
//! PUT    /api/products/{id}                     - Update listing (owner)
//! DELETE /api/products/{id}                     - Archive listing (owner)
//! GET    /api/products/{id}/similar             - Similar listings
//!
//! # Stores
//! POST /api/stores                              - Open a store
//! GET  /api/stores/{slug}                       - Public store page
//! PUT  /api/stores/{id}                         - Update profile (owner)
//! PUT  /api/stores/{id}/delivery                - Delivery settings (owner)
//! GET  /api/stores/{id}/delivery-quote          - Quote delivery
//! GET|POST       /api/stores/{id}/categories
//! PUT|DELETE     /api/stores/{id}/categories/{category_id}
//! GET|POST       /api/stores/{id}/services
//! PUT|DELETE     /api/stores/{id}/services/{service_id}
//!
//! # Taxonomy
//! GET  /api/categories                          - Category tree
//!
//! # Offers (auth)
//! GET|POST /api/offers
//! GET  /api/offers/{id}
//! POST /api/offers/{id}/accept|reject|withdraw|counter
//!
//! # Checkout (auth)
//! POST /api/checkout                            - Start Stripe Checkout
//! GET  /api/orders                              - Buyer's orders
//! POST /api/webhooks/stripe                     - Stripe events (signed)
//!
//! # Support (auth)
//! GET|POST /api/support/tickets
//! GET  /api/support/tickets/{id}
//! POST /api/support/tickets/{id}/messages
//!
//! # Admin
//! GET  /api/admin/curation                      - Curation queue
//! GET  /api/admin/products/{id}/images          - Images of a listing
//! POST /api/admin/products/{id}/images/complete - Finish curation
//! POST /api/admin/products/{id}/images/discover - Scan storage for images
//! GET  /api/admin/discovery-jobs/{id}           - Poll a scan
//! POST /api/admin/images/{id}/cycle             - Next image status
//! POST /api/admin/images/{id}/primary           - Set primary image
//! POST /api/admin/categories
//! PUT|DELETE /api/admin/categories/{id}
//! PUT  /api/admin/support/tickets/{id}/status
//! GET  /api/admin/webhooks/diagnostics
//! ```

pub mod categories;
pub mod checkout;
pub mod curation;
pub mod extract;
pub mod offers;
pub mod products;
pub mod stores;
pub mod support;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::{Request, Response, StatusCode},
    middleware::from_fn,
    routing::{get, post, put},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::db::ProfileRepository;
use crate::error::Result;
use crate::middleware::{
    AuthUser, api_rate_limiter, checkout_rate_limiter, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Make sure the caller has a `profile` row before writing rows that
/// reference it.
pub(crate) async fn ensure_profile(state: &AppState, user: &AuthUser) -> Result<()> {
    ProfileRepository::new(state.pool())
        .ensure(user.id, user.email.as_deref().unwrap_or_default())
        .await?;
    Ok(())
}

/// Create the listing routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::archive),
        )
        .route("/{id}/similar", get(products::similar))
}

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(stores::create))
        // GET takes a slug, PUT takes a store ID
        .route("/{id}", get(stores::show).put(stores::update))
        .route("/{id}/delivery", put(stores::update_delivery))
        .route("/{id}/delivery-quote", get(stores::delivery_quote))
        .route(
            "/{id}/categories",
            get(stores::list_categories).post(stores::create_category),
        )
        .route(
            "/{id}/categories/{category_id}",
            put(stores::update_category).delete(stores::delete_category),
        )
        .route(
            "/{id}/services",
            get(stores::list_services).post(stores::create_service),
        )
        .route(
            "/{id}/services/{service_id}",
            put(stores::update_service).delete(stores::delete_service),
        )
}

/// Create the offer routes router.
pub fn offer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(offers::index).post(offers::create))
        .route("/{id}", get(offers::show))
        .route("/{id}/accept", post(offers::accept))
        .route("/{id}/reject", post(offers::reject))
        .route("/{id}/withdraw", post(offers::withdraw))
        .route("/{id}/counter", post(offers::counter))
}

/// Create the support routes router.
pub fn support_routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(support::index).post(support::create))
        .route("/tickets/{id}", get(support::show))
        .route("/tickets/{id}/messages", post(support::add_message))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/curation", get(curation::queue))
        .route("/products/{id}/images", get(curation::product_images))
        .route("/products/{id}/images/complete", post(curation::complete))
        .route("/products/{id}/images/discover", post(curation::discover))
        .route("/discovery-jobs/{id}", get(curation::discovery_job))
        .route("/images/{id}/cycle", post(curation::cycle))
        .route("/images/{id}/primary", post(curation::primary))
        .route("/categories", post(categories::create))
        .route(
            "/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/support/tickets/{id}/status", put(support::set_status))
        .route("/webhooks/diagnostics", get(webhooks::diagnostics))
}

/// All `/api` routes.
///
/// With `rate_limit` set, checkout gets its own tighter limiter and the rest
/// of the API shares the general one. The webhook is never limited.
pub fn api_routes(rate_limit: bool) -> Router<AppState> {
    let mut checkout = Router::new().route("/checkout", post(checkout::checkout));
    if rate_limit {
        checkout = checkout.layer(checkout_rate_limiter());
    }

    let mut api = Router::new()
        .nest("/products", product_routes())
        .nest("/stores", store_routes())
        .route("/categories", get(categories::tree))
        .nest("/offers", offer_routes())
        .route("/orders", get(checkout::orders))
        .nest("/support", support_routes())
        .nest("/admin", admin_routes())
        .merge(checkout);
    if rate_limit {
        api = api.layer(api_rate_limiter());
    }

    api.route("/webhooks/stripe", post(webhooks::stripe))
}

fn build(state: AppState, rate_limit: bool) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes(rate_limit))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: std::time::Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// The full application without rate limiting.
pub fn app(state: AppState) -> Router {
    build(state, false)
}

/// The full application with per-client rate limits.
///
/// Clients are keyed by proxy headers or the peer address, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn rate_limited_app(state: AppState) -> Router {
    build(state, true)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
