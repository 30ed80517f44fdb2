//! Similar-products ranking.

use axum::http::{Method, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use cyclemart_core::similarity::{ProductAttributes, rank_similar};
use cyclemart_core::{CategoryId, ProductCondition, ProductId};
use cyclemart_integration_tests::{Marketplace, TestContext, json_str};

fn attributes(n: u128, age_days: i64) -> ProductAttributes {
    ProductAttributes {
        id: ProductId::new(Uuid::from_u128(n)),
        category_id: Some(CategoryId::new(Uuid::from_u128(100))),
        subcategory_id: None,
        level3_category_id: None,
        bike_type: None,
        frame_size: None,
        price: Decimal::new(1000, 0),
        condition: None,
        brand: None,
        created_at: Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap() - Duration::days(age_days),
    }
}

// =============================================================================
// Ranking
// =============================================================================

#[test]
fn test_shared_attributes_rank_first() {
    let mut source = attributes(1, 0);
    source.bike_type = Some("gravel".to_string());
    source.brand = Some("Canyon".to_string());
    source.condition = Some(ProductCondition::LikeNew);

    let mut twin = attributes(2, 5);
    twin.bike_type = Some("Gravel".to_string());
    twin.brand = Some(" canyon ".to_string());
    twin.condition = Some(ProductCondition::LikeNew);

    let cousin = attributes(3, 1);

    let ranked = rank_similar(&source, &[cousin.clone(), twin.clone()], 10);
    let ids: Vec<_> = ranked.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![twin.id, cousin.id]);
    assert!(ranked[0].score > ranked[1].score);
}

#[test]
fn test_ties_prefer_newer_listings() {
    let source = attributes(1, 0);
    let older = attributes(2, 30);
    let newer = attributes(3, 2);

    let ranked = rank_similar(&source, &[older.clone(), newer.clone()], 10);
    assert_eq!(ranked[0].id, newer.id);
    assert_eq!(ranked[0].score, ranked[1].score);
}

#[test]
fn test_source_and_unrelated_are_excluded() {
    let source = attributes(1, 0);
    let mut unrelated = attributes(2, 0);
    unrelated.category_id = Some(CategoryId::new(Uuid::from_u128(999)));
    unrelated.price = Decimal::new(50_000, 0);

    let ranked = rank_similar(&source, &[source.clone(), unrelated], 10);
    assert!(ranked.is_empty());
}

#[test]
fn test_limit_is_respected() {
    let source = attributes(1, 0);
    let candidates: Vec<_> = (2..20).map(|n| attributes(n, i64::try_from(n).unwrap())).collect();
    assert_eq!(rank_similar(&source, &candidates, 4).len(), 4);
}

// =============================================================================
// API
// =============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_similar_endpoint_ranks_pool() {
    let ctx = TestContext::new().await;
    let market = Marketplace::seed(&ctx).await;

    let source = market
        .list_bike(
            &ctx,
            json!({
                "title": "Canyon Grail CF SL",
                "price": "2400.00",
                "bike_type": "gravel",
                "frame_size": "M",
                "brand": "Canyon",
                "images": ["https://cdn.test/grail.jpg"],
            }),
        )
        .await;
    let twin = market
        .list_bike(
            &ctx,
            json!({
                "title": "Canyon Grizl AL",
                "price": "2100.00",
                "bike_type": "gravel",
                "frame_size": "M",
                "brand": "Canyon",
                "images": ["https://cdn.test/grizl.jpg"],
            }),
        )
        .await;
    let cousin = market
        .list_bike(
            &ctx,
            json!({
                "title": "Generic commuter",
                "price": "400.00",
                "images": ["https://cdn.test/commuter.jpg"],
            }),
        )
        .await;
    // Without images and as a draft: neither may appear.
    let bare = market
        .list_bike(&ctx, json!({ "title": "No photos yet", "price": "2300.00" }))
        .await;
    let draft = market
        .list_bike(
            &ctx,
            json!({
                "title": "Canyon Grail draft",
                "price": "2400.00",
                "status": "draft",
                "bike_type": "gravel",
                "images": ["https://cdn.test/draft.jpg"],
            }),
        )
        .await;

    let (status, body) = ctx
        .call(
            Method::GET,
            &format!("/api/products/{}/similar?limit=10", json_str(&source, "id")),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let ids: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| json_str(p, "id"))
        .collect();
    assert_eq!(ids, vec![json_str(&twin, "id"), json_str(&cousin, "id")]);
    assert!(!ids.contains(&json_str(&bare, "id")));
    assert!(!ids.contains(&json_str(&draft, "id")));
    assert!(body[0]["score"].as_u64().unwrap() > body[1]["score"].as_u64().unwrap());
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_similar_for_missing_product() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx
        .call(
            Method::GET,
            &format!("/api/products/{}/similar", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
