//! Webhook diagnostics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A recorded webhook delivery, without its payload.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebhookEventSummary {
    pub id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Number of deliveries of one event type.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebhookTypeCount {
    pub event_type: String,
    pub count: i64,
}

/// Health of the Stripe webhook integration.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDiagnostics {
    pub secret_configured: bool,
    pub counts: Vec<WebhookTypeCount>,
    pub failed: i64,
    pub recent: Vec<WebhookEventSummary>,
}
