//! Product image repository.
//!
//! Rows in `product_image` are authoritative. The legacy `product.images`
//! document is rewritten only when curation completes, and copied into the
//! table the first time a curator opens a product that has never been
//! migrated.

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use cyclemart_core::images::{CompletionPlan, ImageRecord, ResolvedImage, to_legacy_document};
use cyclemart_core::{ImageId, ImageStatus, ProductId};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: ImageId,
    product_id: ProductId,
    url: String,
    storage_path: Option<String>,
    status: ImageStatus,
    is_primary: bool,
    position: i32,
}

impl From<ImageRow> for ImageRecord {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            storage_path: row.storage_path,
            status: row.status,
            is_primary: row.is_primary,
            position: row.position,
        }
    }
}

/// An object found in storage that is not yet a `product_image` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImage {
    pub url: String,
    pub storage_path: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product image database operations.
pub struct ImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All image rows of a product, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ImageRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, product_id, url, storage_path, status, is_primary, position
            FROM marketplace.product_image
            WHERE product_id = $1
            ORDER BY position, id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The product an image belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_of(&self, id: ImageId) -> Result<Option<ProductId>, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, product_id, url, storage_path, status, is_primary, position
            FROM marketplace.product_image
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|r| r.product_id))
    }

    /// Copy legacy JSONB images into the table for a product that has no rows.
    ///
    /// Does nothing if rows appeared in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn import_legacy(
        &self,
        product_id: ProductId,
        legacy: &[ResolvedImage],
    ) -> Result<Vec<ImageRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent imports for the same product.
        sqlx::query("SELECT id FROM marketplace.product WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM marketplace.product_image WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        if existing == 0 {
            for image in legacy {
                sqlx::query(
                    r"
                    INSERT INTO marketplace.product_image
                        (product_id, url, status, is_primary, position)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(product_id)
                .bind(&image.url)
                .bind(image.status)
                .bind(image.is_primary)
                .bind(image.position)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        self.list_for_product(product_id).await
    }

    /// Persist one image's status and primary flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image no longer exists.
    pub async fn save(&self, image: &ImageRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE marketplace.product_image SET status = $2, is_primary = $3 WHERE id = $1",
        )
        .bind(image.id)
        .bind(image.status)
        .bind(image.is_primary)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Make `image_id` the only primary image of `product_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn set_primary(
        &self,
        product_id: ProductId,
        image_id: ImageId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE marketplace.product_image SET is_primary = FALSE WHERE product_id = $1 AND is_primary",
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE marketplace.product_image SET is_primary = TRUE WHERE id = $1")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Commit a completion plan.
    ///
    /// Storage objects must already be gone. In one transaction this deletes
    /// the rejected and pending rows, renumbers the kept images, rewrites
    /// the legacy document and marks the product curated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product's rows no longer
    /// match the plan, or `RepositoryError::Database` if the transaction fails.
    pub async fn complete(
        &self,
        product_id: ProductId,
        plan: &CompletionPlan,
    ) -> Result<(), RepositoryError> {
        let delete_ids: Vec<Uuid> = plan.delete_ids().iter().map(ImageId::as_uuid).collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM marketplace.product WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let current: Vec<ImageRecord> = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, product_id, url, storage_path, status, is_primary, position
            FROM marketplace.product_image
            WHERE product_id = $1
            FOR UPDATE
            ",
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        if !plan.still_applies(&current) {
            return Err(RepositoryError::Conflict(
                "images changed while curating, reload and try again".to_owned(),
            ));
        }

        sqlx::query(
            "DELETE FROM marketplace.product_image WHERE product_id = $1 AND id = ANY($2)",
        )
        .bind(product_id)
        .bind(&delete_ids)
        .execute(&mut *tx)
        .await?;

        for (position, image) in (0_i32..).zip(&plan.keep) {
            sqlx::query("UPDATE marketplace.product_image SET position = $2 WHERE id = $1")
                .bind(image.id)
                .bind(position)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r"
            UPDATE marketplace.product
            SET images = $2, images_curated = TRUE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .bind(to_legacy_document(&plan.keep))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Storage paths already known for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn known_paths(
        &self,
        product_id: ProductId,
    ) -> Result<HashSet<String>, RepositoryError> {
        let paths: Vec<String> = sqlx::query_scalar(
            r"
            SELECT storage_path FROM marketplace.product_image
            WHERE product_id = $1 AND storage_path IS NOT NULL
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(paths.into_iter().collect())
    }

    /// Insert discovered objects as pending images after the existing ones.
    ///
    /// Returns how many rows were inserted; paths that raced in are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn insert_discovered(
        &self,
        product_id: ProductId,
        images: &[DiscoveredImage],
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialise with completion, which re-checks the rows under this lock.
        sqlx::query("SELECT id FROM marketplace.product WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let next_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM marketplace.product_image WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut inserted = 0;
        for (position, image) in (next_position..).zip(images) {
            let result = sqlx::query(
                r"
                INSERT INTO marketplace.product_image
                    (product_id, url, storage_path, status, position)
                VALUES ($1, $2, $3, 'pending', $4)
                ON CONFLICT (product_id, storage_path) DO NOTHING
                ",
            )
            .bind(product_id)
            .bind(&image.url)
            .bind(&image.storage_path)
            .bind(position)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
