//! Marketplace category repository.

use sqlx::PgPool;

use cyclemart_core::CategoryId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, parent_id, name, slug, level, position";

/// Repository for the category taxonomy.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every category, unordered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM marketplace.category"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM marketplace.category WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// Create a category at `level` under `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        parent_id: Option<CategoryId>,
        name: &str,
        slug: &str,
        level: i16,
        position: i32,
    ) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r"
            INSERT INTO marketplace.category (parent_id, name, slug, level, position)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(parent_id)
        .bind(name)
        .bind(slug)
        .bind(level)
        .bind(position)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category slug is already taken"))?;
        Ok(category)
    }

    /// Insert or update a category by slug. Used by the taxonomy import.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        parent_id: Option<CategoryId>,
        name: &str,
        slug: &str,
        level: i16,
        position: i32,
    ) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r"
            INSERT INTO marketplace.category (parent_id, name, slug, level, position)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (slug) DO UPDATE
            SET parent_id = EXCLUDED.parent_id, name = EXCLUDED.name,
                level = EXCLUDED.level, position = EXCLUDED.position
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(parent_id)
        .bind(name)
        .bind(slug)
        .bind(level)
        .bind(position)
        .fetch_one(self.pool)
        .await?;
        Ok(category)
    }

    /// Persist a category's name, slug and position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category no longer exists,
    /// `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(&self, category: &Category) -> Result<Category, RepositoryError> {
        let updated = sqlx::query_as::<_, Category>(&format!(
            r"
            UPDATE marketplace.category SET name = $2, slug = $3, position = $4
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.position)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("category slug is already taken"))?;
        updated.ok_or(RepositoryError::NotFound)
    }

    /// Delete a leaf category that no listing uses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category has children or
    /// listings, `RepositoryError::NotFound` if it does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (children, products): (i64, i64) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM marketplace.category WHERE parent_id = $1),
                (SELECT COUNT(*) FROM marketplace.product
                 WHERE category_id = $1 OR subcategory_id = $1 OR level3_category_id = $1)
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if children > 0 {
            return Err(RepositoryError::Conflict(
                "category has subcategories".to_owned(),
            ));
        }
        if products > 0 {
            return Err(RepositoryError::Conflict(
                "category is used by listings".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM marketplace.category WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
