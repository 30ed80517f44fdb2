//! Profile repository.
//!
//! Profiles are created lazily the first time an authenticated user does
//! something that references them.

use sqlx::PgPool;

use cyclemart_core::ProfileId;

use super::RepositoryError;

/// Repository for profile rows.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the profile if missing and keep its email current.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ensure(&self, id: ProfileId, email: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO marketplace.profile (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
            WHERE marketplace.profile.email IS DISTINCT FROM EXCLUDED.email
            ",
        )
        .bind(id)
        .bind(email)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
