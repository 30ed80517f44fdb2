//! Product repository.
//!
//! Listing search is built with `sqlx::QueryBuilder` because every filter is
//! optional.

use sqlx::{PgPool, Postgres, QueryBuilder};

use cyclemart_core::{ProductId, ProductStatus, ProfileId, StoreId};

use super::RepositoryError;
use crate::models::{CurationQueueItem, NewProduct, Product, ProductFilter, ProductListItem};

/// Columns selected for [`Product`], qualified with the `p` alias.
const PRODUCT_COLUMNS: &str = "p.id, p.store_id, p.category_id, p.subcategory_id, \
    p.level3_category_id, p.store_category_id, p.title, p.description, p.price, p.status, \
    p.condition, p.bike_type, p.frame_size, p.brand, p.images_curated, p.created_at, \
    p.updated_at";

/// Maximum number of candidates considered for similar products.
const SIMILAR_POOL_SIZE: i64 = 200;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductListRow {
    #[sqlx(flatten)]
    product: Product,
    primary_image_url: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductWithImagesRow {
    #[sqlx(flatten)]
    product: Product,
    images: serde_json::Value,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for listing database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search active listings.
    ///
    /// Returns the requested page and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        filter: &ProductFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<ProductListItem>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM marketplace.product p WHERE p.status = 'active'",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT ");
        query.push(PRODUCT_COLUMNS);
        query.push(
            ", COALESCE(
                (SELECT i.url FROM marketplace.product_image i
                 WHERE i.product_id = p.id AND i.status = 'approved'
                 ORDER BY i.is_primary DESC, i.position LIMIT 1),
                CASE jsonb_typeof(p.images -> 0)
                    WHEN 'string' THEN p.images ->> 0
                    WHEN 'object' THEN p.images -> 0 ->> 'url'
                END
            ) AS primary_image_url
            FROM marketplace.product p WHERE p.status = 'active'",
        );
        push_filters(&mut query, filter);
        query.push(" ORDER BY ");
        query.push(filter.sort.order_by());
        query.push(" LIMIT ");
        query.push_bind(i64::from(per_page));
        query.push(" OFFSET ");
        query.push_bind(i64::from(page - 1) * i64::from(per_page));

        let rows: Vec<ProductListRow> = query.build_query_as().fetch_all(self.pool).await?;
        let items = rows
            .into_iter()
            .map(|row| ProductListItem {
                product: row.product,
                primary_image_url: row.primary_image_url,
            })
            .collect();

        Ok((items, total))
    }

    /// Get a listing by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM marketplace.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get a listing together with its legacy images document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_legacy_images(
        &self,
        id: ProductId,
    ) -> Result<Option<(Product, serde_json::Value)>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductWithImagesRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}, p.images FROM marketplace.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|r| (r.product, r.images)))
    }

    /// The profile that owns the listing's store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn owner(&self, id: ProductId) -> Result<Option<ProfileId>, RepositoryError> {
        let owner = sqlx::query_scalar::<_, ProfileId>(
            r"
            SELECT s.owner_id
            FROM marketplace.product p
            JOIN marketplace.store s ON s.id = p.store_id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(owner)
    }

    /// Create a listing in `store_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let created = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO marketplace.product AS p (
                store_id, category_id, subcategory_id, level3_category_id, store_category_id,
                title, description, price, status, condition, bike_type, frame_size, brand,
                images
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(product.category_id)
        .bind(product.subcategory_id)
        .bind(product.level3_category_id)
        .bind(product.store_category_id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.status)
        .bind(product.condition)
        .bind(&product.bike_type)
        .bind(&product.frame_size)
        .bind(&product.brand)
        .bind(product.legacy_images())
        .fetch_one(self.pool)
        .await?;
        Ok(created)
    }

    /// Persist the editable fields of `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the listing no longer exists.
    pub async fn update(&self, product: &Product) -> Result<Product, RepositoryError> {
        let updated = sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE marketplace.product AS p SET
                category_id = $2, subcategory_id = $3, level3_category_id = $4,
                store_category_id = $5, title = $6, description = $7, price = $8,
                status = $9, condition = $10, bike_type = $11, frame_size = $12, brand = $13,
                updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(product.id)
        .bind(product.category_id)
        .bind(product.subcategory_id)
        .bind(product.level3_category_id)
        .bind(product.store_category_id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.status)
        .bind(product.condition)
        .bind(&product.bike_type)
        .bind(&product.frame_size)
        .bind(&product.brand)
        .fetch_optional(self.pool)
        .await?;
        updated.ok_or(RepositoryError::NotFound)
    }

    /// Move a listing to `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the listing does not exist.
    pub async fn set_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE marketplace.product SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Candidate pool for similar products.
    ///
    /// Other active listings in the same category that have at least one
    /// approved image, or legacy images when they were never migrated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn similar_candidates(
        &self,
        source: &Product,
    ) -> Result<Vec<Product>, RepositoryError> {
        let candidates = sqlx::query_as::<_, Product>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM marketplace.product p
            WHERE p.status = 'active'
              AND p.category_id = $1
              AND p.id <> $2
              AND (
                  EXISTS (
                      SELECT 1 FROM marketplace.product_image i
                      WHERE i.product_id = p.id AND i.status = 'approved'
                  )
                  OR (
                      NOT EXISTS (
                          SELECT 1 FROM marketplace.product_image i WHERE i.product_id = p.id
                      )
                      AND jsonb_typeof(p.images) = 'array'
                      AND jsonb_array_length(p.images) > 0
                  )
              )
            ORDER BY p.created_at DESC
            LIMIT $3
            "
        ))
        .bind(source.category_id)
        .bind(source.id)
        .bind(SIMILAR_POOL_SIZE)
        .fetch_all(self.pool)
        .await?;
        Ok(candidates)
    }

    /// Listings that still need curation: pending images or never completed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn curation_queue(&self) -> Result<Vec<CurationQueueItem>, RepositoryError> {
        let items = sqlx::query_as::<_, CurationQueueItem>(
            r"
            SELECT p.id, p.title, p.status, p.images_curated,
                   COUNT(i.id) FILTER (WHERE i.status = 'pending') AS pending_images,
                   COUNT(i.id) AS total_images,
                   p.updated_at
            FROM marketplace.product p
            LEFT JOIN marketplace.product_image i ON i.product_id = p.id
            WHERE p.status IN ('draft', 'active')
            GROUP BY p.id
            HAVING NOT p.images_curated
                OR COUNT(i.id) FILTER (WHERE i.status = 'pending') > 0
            ORDER BY p.updated_at ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }
}

/// Append the optional search filters to a query that already has a `WHERE`.
fn push_filters<'args>(query: &mut QueryBuilder<'args, Postgres>, filter: &'args ProductFilter) {
    if let Some(category) = filter.category {
        query.push(" AND p.category_id = ").push_bind(category);
    }
    if let Some(subcategory) = filter.subcategory {
        query.push(" AND p.subcategory_id = ").push_bind(subcategory);
    }
    if let Some(bike_type) = filter.bike_type.as_deref() {
        query
            .push(" AND LOWER(p.bike_type) = LOWER(")
            .push_bind(bike_type.trim())
            .push(")");
    }
    if let Some(condition) = filter.condition {
        query.push(" AND p.condition = ").push_bind(condition);
    }
    if let Some(store) = filter.store {
        query.push(" AND p.store_id = ").push_bind(store);
    }
    if let Some(min_price) = filter.min_price {
        query.push(" AND p.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        query.push(" AND p.price <= ").push_bind(max_price);
    }
    if let Some(q) = filter.search_text() {
        let pattern = format!("%{}%", escape_like(&q));
        query
            .push(" AND (p.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.brand ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
