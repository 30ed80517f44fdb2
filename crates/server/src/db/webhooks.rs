//! Webhook event log.

use serde_json::Value;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{WebhookDiagnostics, WebhookEventSummary, WebhookTypeCount};

const RECENT_EVENTS: i64 = 20;

/// Repository for received payment webhooks.
pub struct WebhookEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WebhookEventRepository<'a> {
    /// Create a new webhook event repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an event. Returns `false` if it was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &self,
        id: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO marketplace.webhook_event (id, event_type, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(id)
        .bind(event_type)
        .bind(payload)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark an event as handled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_processed(&self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE marketplace.webhook_event SET processed_at = NOW(), error = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Store the error that stopped an event from being handled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE marketplace.webhook_event SET error = $2 WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Counts per event type, failures and the latest deliveries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn diagnostics(
        &self,
        secret_configured: bool,
    ) -> Result<WebhookDiagnostics, RepositoryError> {
        let counts = sqlx::query_as::<_, WebhookTypeCount>(
            r"
            SELECT event_type, COUNT(*) AS count
            FROM marketplace.webhook_event
            GROUP BY event_type
            ORDER BY count DESC, event_type
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let failed = sqlx::query_scalar(
            "SELECT COUNT(*) FROM marketplace.webhook_event WHERE error IS NOT NULL",
        )
        .fetch_one(self.pool)
        .await?;

        let recent = sqlx::query_as::<_, WebhookEventSummary>(
            r"
            SELECT id, event_type, received_at, processed_at, error
            FROM marketplace.webhook_event
            ORDER BY received_at DESC
            LIMIT $1
            ",
        )
        .bind(RECENT_EVENTS)
        .fetch_all(self.pool)
        .await?;

        Ok(WebhookDiagnostics {
            secret_configured,
            counts,
            failed,
            recent,
        })
    }
}
