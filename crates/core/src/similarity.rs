//! Similar-products scoring.
//!
//! A candidate earns fixed points for every attribute it shares with the
//! source listing. Candidates are ranked by score, newest first on ties, and
//! anything that shares nothing is dropped.
//!
//! | Attribute            | Points |
//! |----------------------|--------|
//! | subcategory          | 5      |
//! | category             | 3      |
//! | level-3 category     | 4      |
//! | bike type            | 4      |
//! | frame size           | 3      |
//! | price within 30 %    | 2      |
//! | price within 50 %    | 1      |
//! | condition            | 2      |
//! | brand                | 3      |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{CategoryId, ProductCondition, ProductId};

pub const SUBCATEGORY_POINTS: u32 = 5;
pub const CATEGORY_POINTS: u32 = 3;
pub const LEVEL3_CATEGORY_POINTS: u32 = 4;
pub const BIKE_TYPE_POINTS: u32 = 4;
pub const FRAME_SIZE_POINTS: u32 = 3;
pub const NEAR_PRICE_POINTS: u32 = 2;
pub const FAR_PRICE_POINTS: u32 = 1;
pub const CONDITION_POINTS: u32 = 2;
pub const BRAND_POINTS: u32 = 3;

/// Price band (fraction of the source price) for [`NEAR_PRICE_POINTS`].
const NEAR_PRICE_BAND: Decimal = Decimal::from_parts(30, 0, 0, false, 2);
/// Price band (fraction of the source price) for [`FAR_PRICE_POINTS`].
const FAR_PRICE_BAND: Decimal = Decimal::from_parts(50, 0, 0, false, 2);

/// The attributes of a listing that take part in scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductAttributes {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<CategoryId>,
    pub level3_category_id: Option<CategoryId>,
    pub bike_type: Option<String>,
    pub frame_size: Option<String>,
    pub price: Decimal,
    pub condition: Option<ProductCondition>,
    pub brand: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A candidate with its computed score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredProduct {
    pub id: ProductId,
    pub score: u32,
    pub created_at: DateTime<Utc>,
}

fn same_id(a: Option<CategoryId>, b: Option<CategoryId>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((normalized(a), normalized(b)), (Some(a), Some(b)) if a == b)
}

fn price_points(source: Decimal, candidate: Decimal) -> u32 {
    if source <= Decimal::ZERO {
        return 0;
    }

    let ratio = (candidate - source).abs() / source;
    if ratio <= NEAR_PRICE_BAND {
        NEAR_PRICE_POINTS
    } else if ratio <= FAR_PRICE_BAND {
        FAR_PRICE_POINTS
    } else {
        0
    }
}

/// Score a single candidate against the source listing.
#[must_use]
pub fn score(source: &ProductAttributes, candidate: &ProductAttributes) -> u32 {
    let mut total = 0;

    if same_id(source.subcategory_id, candidate.subcategory_id) {
        total += SUBCATEGORY_POINTS;
    }
    if same_id(source.category_id, candidate.category_id) {
        total += CATEGORY_POINTS;
    }
    if same_id(source.level3_category_id, candidate.level3_category_id) {
        total += LEVEL3_CATEGORY_POINTS;
    }
    if same_text(source.bike_type.as_deref(), candidate.bike_type.as_deref()) {
        total += BIKE_TYPE_POINTS;
    }
    if same_text(source.frame_size.as_deref(), candidate.frame_size.as_deref()) {
        total += FRAME_SIZE_POINTS;
    }

    total += price_points(source.price, candidate.price);

    if matches!((source.condition, candidate.condition), (Some(a), Some(b)) if a == b) {
        total += CONDITION_POINTS;
    }
    if same_text(source.brand.as_deref(), candidate.brand.as_deref()) {
        total += BRAND_POINTS;
    }

    total
}

/// Rank candidates against the source and keep the best `limit`.
///
/// The source itself is never returned, candidates scoring zero are dropped,
/// and ties resolve to the most recently created listing (then by ID so the
/// output is fully deterministic).
#[must_use]
pub fn rank_similar(
    source: &ProductAttributes,
    candidates: &[ProductAttributes],
    limit: usize,
) -> Vec<ScoredProduct> {
    let mut scored: Vec<ScoredProduct> = candidates
        .iter()
        .filter(|c| c.id != source.id)
        .map(|c| ScoredProduct {
            id: c.id,
            score: score(source, c),
            created_at: c.created_at,
        })
        .filter(|s| s.score > 0)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn category(n: u128) -> Option<CategoryId> {
        Some(CategoryId::new(Uuid::from_u128(n)))
    }

    fn bare(n: u128, price: i64, day: u32) -> ProductAttributes {
        ProductAttributes {
            id: ProductId::new(Uuid::from_u128(n)),
            category_id: None,
            subcategory_id: None,
            level3_category_id: None,
            bike_type: None,
            frame_size: None,
            price: Decimal::new(price, 0),
            condition: None,
            brand: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
        }
    }

    fn full(n: u128) -> ProductAttributes {
        ProductAttributes {
            category_id: category(1),
            subcategory_id: category(10),
            level3_category_id: category(100),
            bike_type: Some("Gravel".to_string()),
            frame_size: Some("56cm".to_string()),
            condition: Some(ProductCondition::Good),
            brand: Some("Canyon".to_string()),
            ..bare(n, 1000, 1)
        }
    }

    #[test]
    fn test_identical_attributes_score_maximum() {
        let source = full(1);
        let candidate = full(2);
        assert_eq!(score(&source, &candidate), 5 + 3 + 4 + 4 + 3 + 2 + 2 + 3);
    }

    #[test]
    fn test_text_matching_ignores_case_and_whitespace() {
        let source = full(1);
        let mut candidate = bare(2, 5000, 1);
        candidate.brand = Some("  canyon ".to_string());
        candidate.bike_type = Some("GRAVEL".to_string());
        assert_eq!(score(&source, &candidate), BRAND_POINTS + BIKE_TYPE_POINTS);
    }

    #[test]
    fn test_empty_text_never_matches() {
        let mut source = bare(1, 0, 1);
        source.brand = Some(String::new());
        let mut candidate = bare(2, 0, 1);
        candidate.brand = Some("   ".to_string());
        assert_eq!(score(&source, &candidate), 0);
    }

    #[test]
    fn test_missing_categories_do_not_match() {
        let source = bare(1, 0, 1);
        let candidate = bare(2, 0, 1);
        assert_eq!(score(&source, &candidate), 0);
    }

    #[test]
    fn test_price_bands() {
        let source = bare(1, 1000, 1);
        assert_eq!(score(&source, &bare(2, 1300, 1)), NEAR_PRICE_POINTS);
        assert_eq!(score(&source, &bare(3, 700, 1)), NEAR_PRICE_POINTS);
        assert_eq!(score(&source, &bare(4, 1301, 1)), FAR_PRICE_POINTS);
        assert_eq!(score(&source, &bare(5, 1500, 1)), FAR_PRICE_POINTS);
        assert_eq!(score(&source, &bare(6, 1501, 1)), 0);
        assert_eq!(score(&source, &bare(7, 400, 1)), 0);
    }

    #[test]
    fn test_zero_source_price_awards_no_price_points() {
        let source = bare(1, 0, 1);
        assert_eq!(score(&source, &bare(2, 0, 1)), 0);
    }

    #[test]
    fn test_rank_orders_by_score_then_recency() {
        let source = full(1);

        let mut weak = bare(2, 1000, 20);
        weak.category_id = category(1);

        let strong_old = ProductAttributes {
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            ..full(3)
        };
        let strong_new = ProductAttributes {
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            ..full(4)
        };

        let ranked = rank_similar(&source, &[weak.clone(), strong_old, strong_new], 10);
        let ids: Vec<ProductId> = ranked.iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                ProductId::new(Uuid::from_u128(4)),
                ProductId::new(Uuid::from_u128(3)),
                weak.id
            ]
        );
    }

    #[test]
    fn test_rank_drops_source_and_zero_scores() {
        let source = bare(1, 1000, 1);
        let unrelated = bare(2, 99_999, 1);
        let ranked = rank_similar(&source, &[source.clone(), unrelated], 10);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_rank_truncates_to_limit() {
        let source = full(1);
        let candidates: Vec<ProductAttributes> = (2..10).map(full).collect();
        assert_eq!(rank_similar(&source, &candidates, 3).len(), 3);
        assert!(rank_similar(&source, &candidates, 0).is_empty());
    }
}
