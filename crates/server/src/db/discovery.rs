//! Image discovery job repository.

use std::time::Duration;

use sqlx::PgPool;

use cyclemart_core::{DiscoveryJobId, ProductId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::DiscoveryJob;

const JOB_COLUMNS: &str = "id, product_id, status, found, error, created_at, finished_at";

/// A job still queued or running after this long is presumed dead.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Repository for discovery jobs.
pub struct DiscoveryJobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DiscoveryJobRepository<'a> {
    /// Create a new discovery job repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Queue a job for `product_id`.
    ///
    /// Active jobs older than [`JOB_TIMEOUT`] are marked failed first, so a
    /// task lost to a restart does not block the product forever.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a live job is already queued or
    /// running for the product.
    pub async fn enqueue(&self, product_id: ProductId) -> Result<DiscoveryJob, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let abandoned = sqlx::query(
            r"
            UPDATE marketplace.image_discovery_job
            SET status = 'failed', error = 'abandoned', finished_at = NOW()
            WHERE product_id = $1
              AND status IN ('queued', 'running')
              AND created_at < NOW() - make_interval(secs => $2)
            ",
        )
        .bind(product_id)
        .bind(JOB_TIMEOUT.as_secs_f64())
        .execute(&mut *tx)
        .await?;
        if abandoned.rows_affected() > 0 {
            tracing::warn!(%product_id, "Failed abandoned image discovery job");
        }

        let job = sqlx::query_as::<_, DiscoveryJob>(&format!(
            "INSERT INTO marketplace.image_discovery_job (product_id) VALUES ($1) RETURNING {JOB_COLUMNS}"
        ))
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique(
            "image discovery is already running for this product",
        ))?;

        tx.commit().await?;
        Ok(job)
    }

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DiscoveryJobId) -> Result<Option<DiscoveryJob>, RepositoryError> {
        let job = sqlx::query_as::<_, DiscoveryJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM marketplace.image_discovery_job WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(job)
    }

    /// Mark a queued job as running.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_running(&self, id: DiscoveryJobId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE marketplace.image_discovery_job SET status = 'running' WHERE id = $1 AND status = 'queued'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a successful run.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_completed(&self, id: DiscoveryJobId, found: i32) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE marketplace.image_discovery_job
            SET status = 'completed', found = $2, finished_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(found)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed run.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_failed(&self, id: DiscoveryJobId, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE marketplace.image_discovery_job
            SET status = 'failed', error = $2, finished_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
