//! Image discovery jobs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cyclemart_core::{DiscoveryJobId, DiscoveryJobStatus, ProductId};

/// A background scan of a product's storage prefix.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiscoveryJob {
    pub id: DiscoveryJobId,
    pub product_id: ProductId,
    pub status: DiscoveryJobStatus,
    /// Number of new images inserted.
    pub found: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
