//! Database operations for the marketplace `PostgreSQL` database.
//!
//! # Schema: `marketplace`
//!
//! ## Tables
//!
//! - `profile` - Users of the hosted auth provider, keyed by the JWT `sub`
//! - `store`, `store_category`, `store_service` - Seller storefronts
//! - `category` - Marketplace taxonomy (three levels)
//! - `product`, `product_image` - Listings and their curated images
//! - `image_discovery_job` - Background storage scans for new images
//! - `offer`, `offer_event` - Negotiations and their history
//! - `purchase_order` - Checkout orders
//! - `webhook_event` - Stripe webhook deliveries
//! - `support_ticket`, `ticket_message` - Buyer support
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p cyclemart-cli -- migrate
//! ```

pub mod categories;
pub mod discovery;
pub mod images;
pub mod offers;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod stores;
pub mod support;
pub mod webhooks;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use discovery::DiscoveryJobRepository;
pub use images::ImageRepository;
pub use offers::OfferRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::ProfileRepository;
pub use stores::StoreRepository;
pub use support::SupportRepository;
pub use webhooks::WebhookEventRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    let message = message.to_owned();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message);
        }
        RepositoryError::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
