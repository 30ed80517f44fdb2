//! Store repository: store profiles, delivery settings, store categories and
//! services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use cyclemart_core::delivery::DeliverySettings;
use cyclemart_core::{ProfileId, ServiceId, StoreCategoryId, StoreId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewService, NewStore, NewStoreCategory, Store, StoreCategory, StoreService};

const STORE_COLUMNS: &str = "id, owner_id, slug, name, description, location, logo_url, \
    delivery_enabled, delivery_base_fee, delivery_per_km_fee, delivery_free_over, \
    delivery_max_distance_km, created_at, updated_at";

const SERVICE_COLUMNS: &str =
    "id, store_id, name, description, price, duration_minutes, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    owner_id: ProfileId,
    slug: String,
    name: String,
    description: Option<String>,
    location: Option<String>,
    logo_url: Option<String>,
    delivery_enabled: bool,
    delivery_base_fee: Decimal,
    delivery_per_km_fee: Decimal,
    delivery_free_over: Option<Decimal>,
    delivery_max_distance_km: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            location: row.location,
            logo_url: row.logo_url,
            delivery: DeliverySettings {
                enabled: row.delivery_enabled,
                base_fee: row.delivery_base_fee,
                per_km_fee: row.delivery_per_km_fee,
                free_over: row.delivery_free_over,
                max_distance_km: row.delivery_max_distance_km,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Map store insert failures onto the constraint that was hit.
fn store_conflict(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let message = match db_err.constraint() {
            Some("store_owner_id_key") => "you already have a store",
            _ => "store slug is already taken",
        };
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a store owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a store or
    /// the slug is taken.
    pub async fn create(&self, owner: ProfileId, store: &NewStore) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            INSERT INTO marketplace.store (owner_id, slug, name, description, location, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(owner)
        .bind(&store.slug)
        .bind(&store.name)
        .bind(&store.description)
        .bind(&store.location)
        .bind(&store.logo_url)
        .fetch_one(self.pool)
        .await
        .map_err(store_conflict)?;
        Ok(row.into())
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Get a store by its public slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Get the store owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_owner(&self, owner: ProfileId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM marketplace.store WHERE owner_id = $1"
        ))
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Persist the profile fields of `store`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store no longer exists.
    pub async fn update_profile(&self, store: &Store) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            UPDATE marketplace.store
            SET name = $2, description = $3, location = $4, logo_url = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(store.id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(&store.location)
        .bind(&store.logo_url)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Replace a store's delivery settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store no longer exists.
    pub async fn update_delivery(
        &self,
        id: StoreId,
        settings: &DeliverySettings,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            UPDATE marketplace.store
            SET delivery_enabled = $2, delivery_base_fee = $3, delivery_per_km_fee = $4,
                delivery_free_over = $5, delivery_max_distance_km = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(settings.enabled)
        .bind(settings.base_fee)
        .bind(settings.per_km_fee)
        .bind(settings.free_over)
        .bind(settings.max_distance_km)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Number of active listings in a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_listing_count(&self, id: StoreId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM marketplace.product WHERE store_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Store categories
    // =========================================================================

    /// Categories of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self, store: StoreId) -> Result<Vec<StoreCategory>, RepositoryError> {
        let categories = sqlx::query_as::<_, StoreCategory>(
            r"
            SELECT id, store_id, name, position, created_at
            FROM marketplace.store_category
            WHERE store_id = $1
            ORDER BY position, name
            ",
        )
        .bind(store)
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Add a category to a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the store already has a category
    /// with this name.
    pub async fn create_category(
        &self,
        store: StoreId,
        category: &NewStoreCategory,
    ) -> Result<StoreCategory, RepositoryError> {
        let created = sqlx::query_as::<_, StoreCategory>(
            r"
            INSERT INTO marketplace.store_category (store_id, name, position)
            VALUES ($1, $2, $3)
            RETURNING id, store_id, name, position, created_at
            ",
        )
        .bind(store)
        .bind(&category.name)
        .bind(category.position)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("a category with this name already exists"))?;
        Ok(created)
    }

    /// Rename or reorder a store category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category is not in the store,
    /// `RepositoryError::Conflict` if the new name is taken.
    pub async fn update_category(
        &self,
        store: StoreId,
        id: StoreCategoryId,
        category: &NewStoreCategory,
    ) -> Result<StoreCategory, RepositoryError> {
        let updated = sqlx::query_as::<_, StoreCategory>(
            r"
            UPDATE marketplace.store_category
            SET name = $3, position = $4
            WHERE id = $1 AND store_id = $2
            RETURNING id, store_id, name, position, created_at
            ",
        )
        .bind(id)
        .bind(store)
        .bind(&category.name)
        .bind(category.position)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("a category with this name already exists"))?;
        updated.ok_or(RepositoryError::NotFound)
    }

    /// Remove a store category. Listings in it become uncategorised.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category is not in the store.
    pub async fn delete_category(
        &self,
        store: StoreId,
        id: StoreCategoryId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM marketplace.store_category WHERE id = $1 AND store_id = $2")
                .bind(id)
                .bind(store)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Services offered by a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_services(&self, store: StoreId) -> Result<Vec<StoreService>, RepositoryError> {
        let services = sqlx::query_as::<_, StoreService>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM marketplace.store_service WHERE store_id = $1 ORDER BY name"
        ))
        .bind(store)
        .fetch_all(self.pool)
        .await?;
        Ok(services)
    }

    /// Add a service to a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_service(
        &self,
        store: StoreId,
        service: &NewService,
    ) -> Result<StoreService, RepositoryError> {
        let created = sqlx::query_as::<_, StoreService>(&format!(
            r"
            INSERT INTO marketplace.store_service (store_id, name, description, price, duration_minutes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SERVICE_COLUMNS}
            "
        ))
        .bind(store)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price)
        .bind(service.duration_minutes)
        .fetch_one(self.pool)
        .await?;
        Ok(created)
    }

    /// Replace a service's details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service is not in the store.
    pub async fn update_service(
        &self,
        store: StoreId,
        id: ServiceId,
        service: &NewService,
    ) -> Result<StoreService, RepositoryError> {
        let updated = sqlx::query_as::<_, StoreService>(&format!(
            r"
            UPDATE marketplace.store_service
            SET name = $3, description = $4, price = $5, duration_minutes = $6
            WHERE id = $1 AND store_id = $2
            RETURNING {SERVICE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price)
        .bind(service.duration_minutes)
        .fetch_optional(self.pool)
        .await?;
        updated.ok_or(RepositoryError::NotFound)
    }

    /// Remove a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service is not in the store.
    pub async fn delete_service(&self, store: StoreId, id: ServiceId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM marketplace.store_service WHERE id = $1 AND store_id = $2")
                .bind(id)
                .bind(store)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
