//! External clients and background work.
//!
//! # Services
//!
//! - `stripe` - Checkout Sessions and webhook signature verification
//! - `storage` - Hosted object storage (listing, deletion, public URLs)
//! - `discovery` - Background scan of a product's storage folder
//! - `similar` - Cached similar-products ranking

pub mod discovery;
pub mod similar;
pub mod storage;
pub mod stripe;

pub use similar::SimilarProducts;
pub use storage::StorageClient;
pub use stripe::StripeClient;
