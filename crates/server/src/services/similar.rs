//! Similar-products lookup with a short-lived cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use cyclemart_core::ProductId;
use cyclemart_core::similarity::{ProductAttributes, rank_similar};

use crate::db::{ProductRepository, RepositoryError};
use crate::models::{Product, SimilarProduct};

const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 10_000;

/// Ranked similar listings, cached per (product, limit).
#[derive(Clone)]
pub struct SimilarProducts {
    cache: Cache<(ProductId, usize), Arc<Vec<SimilarProduct>>>,
}

impl Default for SimilarProducts {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarProducts {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Listings similar to `source`, best first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the candidate query fails.
    #[instrument(skip(self, pool, source), fields(product_id = %source.id))]
    pub async fn find(
        &self,
        pool: &PgPool,
        source: &Product,
        limit: usize,
    ) -> Result<Arc<Vec<SimilarProduct>>, RepositoryError> {
        let key = (source.id, limit);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Similar products cache hit");
            return Ok(cached);
        }

        let candidates = ProductRepository::new(pool)
            .similar_candidates(source)
            .await?;
        let ranked = Arc::new(rank(source, candidates, limit));

        self.cache.insert(key, Arc::clone(&ranked)).await;
        Ok(ranked)
    }
}

impl std::fmt::Debug for SimilarProducts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarProducts")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

/// Score `candidates` against `source` and keep the top `limit`.
pub(crate) fn rank(source: &Product, candidates: Vec<Product>, limit: usize) -> Vec<SimilarProduct> {
    let attributes: Vec<ProductAttributes> = candidates.iter().map(Product::attributes).collect();
    let ranked = rank_similar(&source.attributes(), &attributes, limit);

    let mut by_id: std::collections::HashMap<ProductId, Product> =
        candidates.into_iter().map(|p| (p.id, p)).collect();

    ranked
        .into_iter()
        .filter_map(|scored| {
            by_id.remove(&scored.id).map(|product| SimilarProduct {
                product,
                score: scored.score,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use cyclemart_core::{CategoryId, ProductStatus, StoreId};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;

    fn product(n: u128, category: u128, brand: Option<&str>, price: i64) -> Product {
        let created_at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        Product {
            id: ProductId::new(Uuid::from_u128(n)),
            store_id: StoreId::new(Uuid::from_u128(100)),
            category_id: CategoryId::new(Uuid::from_u128(category)),
            subcategory_id: None,
            level3_category_id: None,
            store_category_id: None,
            title: format!("Bike {n}"),
            description: None,
            price: Decimal::new(price, 0),
            status: ProductStatus::Active,
            condition: None,
            bike_type: None,
            frame_size: None,
            brand: brand.map(String::from),
            images_curated: true,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_rank_keeps_product_rows() {
        let source = product(1, 10, Some("Trek"), 1000);
        let candidates = vec![
            product(2, 10, None, 5000),
            product(3, 10, Some("trek"), 1100),
            product(4, 20, None, 5000),
        ];

        let ranked = rank(&source, candidates, 6);

        let ids: Vec<ProductId> = ranked.iter().map(|s| s.product.id).collect();
        assert_eq!(
            ids,
            vec![
                ProductId::new(Uuid::from_u128(3)),
                ProductId::new(Uuid::from_u128(2)),
            ]
        );
        assert_eq!(ranked[0].score, 3 + 3 + 2);
        assert_eq!(ranked[1].score, 3);
        assert_eq!(ranked[0].product.title, "Bike 3");
    }

    #[test]
    fn test_rank_respects_limit() {
        let source = product(1, 10, None, 1000);
        let candidates = (2..10).map(|n| product(n, 10, None, 1000)).collect();
        assert_eq!(rank(&source, candidates, 3).len(), 3);
    }
}
