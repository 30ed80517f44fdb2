//! Offer / counter-offer negotiation.

use axum::http::{Method, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use cyclemart_core::offers::{Negotiation, OfferAction, OfferError};
use cyclemart_core::{OfferStatus, Party};
use cyclemart_integration_tests::{Marketplace, TestContext, bearer, json_str};

// =============================================================================
// Negotiation rules
// =============================================================================

#[test]
fn test_counter_then_accept() {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
    let ttl = Duration::hours(48);

    let offer = Negotiation::open(Decimal::new(800, 0), Decimal::new(1000, 0), now, ttl).unwrap();
    let countered = offer
        .apply(Party::Seller, &OfferAction::Counter(Decimal::new(900, 0)), now, ttl)
        .unwrap();
    assert_eq!(countered.status, OfferStatus::Countered);
    assert_eq!(countered.round, 2);

    assert_eq!(
        countered.apply(Party::Seller, &OfferAction::Accept, now, ttl),
        Err(OfferError::NotYourTurn)
    );

    let accepted = countered
        .apply(Party::Buyer, &OfferAction::Accept, now, ttl)
        .unwrap();
    assert_eq!(accepted.status, OfferStatus::Accepted);
    assert_eq!(accepted.amount, Decimal::new(900, 0));
    assert!(accepted.payable(now + Duration::hours(1)));
    assert!(!accepted.payable(now + Duration::hours(49)));
}

#[test]
fn test_lapsed_offer_cannot_be_accepted() {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
    let ttl = Duration::hours(48);
    let offer = Negotiation::open(Decimal::new(500, 0), Decimal::new(600, 0), now, ttl).unwrap();

    assert_eq!(
        offer.apply(Party::Seller, &OfferAction::Accept, now + Duration::hours(72), ttl),
        Err(OfferError::Expired)
    );
}

// =============================================================================
// API
// =============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_negotiation_over_api() {
    let ctx = TestContext::new().await;
    let market = Marketplace::seed(&ctx).await;
    let buyer = bearer(Uuid::new_v4(), false);
    let stranger = bearer(Uuid::new_v4(), false);

    let product = market
        .list_bike(&ctx, json!({ "title": "Cervelo Caledonia", "price": "1000.00" }))
        .await;
    let product_id = json_str(&product, "id");

    // Above the asking price.
    let (status, _) = ctx
        .call(
            Method::POST,
            "/api/offers",
            Some(&buyer),
            Some(json!({ "product_id": product_id, "amount": "1200.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Sellers cannot bid on their own bike.
    let (status, _) = ctx
        .call(
            Method::POST,
            "/api/offers",
            Some(&market.seller),
            Some(json!({ "product_id": product_id, "amount": "900.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, offer) = ctx
        .call(
            Method::POST,
            "/api/offers",
            Some(&buyer),
            Some(json!({ "product_id": product_id, "amount": "800.00", "message": "Cash today?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{offer}");
    assert_eq!(offer["status"], "pending");
    let offer_id = json_str(&offer, "id");

    // One open offer per buyer and listing.
    let (status, _) = ctx
        .call(
            Method::POST,
            "/api/offers",
            Some(&buyer),
            Some(json!({ "product_id": product_id, "amount": "750.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The buyer made the last move.
    let (status, _) = ctx
        .call(
            Method::POST,
            &format!("/api/offers/{offer_id}/accept"),
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, countered) = ctx
        .call(
            Method::POST,
            &format!("/api/offers/{offer_id}/counter"),
            Some(&market.seller),
            Some(json!({ "amount": "900.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{countered}");
    assert_eq!(countered["status"], "countered");
    assert_eq!(countered["round"], 2);

    let (status, accepted) = ctx
        .call(
            Method::POST,
            &format!("/api/offers/{offer_id}/accept"),
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");
    let amount: Decimal = json_str(&accepted, "amount").parse().unwrap();
    assert_eq!(amount, Decimal::new(900, 0));

    let (status, detail) = ctx
        .call(Method::GET, &format!("/api/offers/{offer_id}"), Some(&market.seller), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = detail["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["open", "counter", "accept"]);

    let (status, _) = ctx
        .call(Method::GET, &format!("/api/offers/{offer_id}"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listed) = ctx
        .call(Method::GET, "/api/offers?role=seller", Some(&market.seller), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        listed
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["id"] == offer_id.as_str())
    );
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_only_buyer_can_withdraw() {
    let ctx = TestContext::new().await;
    let market = Marketplace::seed(&ctx).await;
    let buyer = bearer(Uuid::new_v4(), false);

    let product = market
        .list_bike(&ctx, json!({ "title": "Surly Straggler", "price": "1400.00" }))
        .await;
    let (_, offer) = ctx
        .call(
            Method::POST,
            "/api/offers",
            Some(&buyer),
            Some(json!({ "product_id": json_str(&product, "id"), "amount": "1300.00" })),
        )
        .await;
    let withdraw = format!("/api/offers/{}/withdraw", json_str(&offer, "id"));

    let (status, _) = ctx.call(Method::POST, &withdraw, Some(&market.seller), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, withdrawn) = ctx.call(Method::POST, &withdraw, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn["status"], "withdrawn");

    let (status, _) = ctx.call(Method::POST, &withdraw, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

/// Push an offer's expiry into the past.
async fn lapse(ctx: &TestContext, offer_id: &str) {
    sqlx::query(
        "UPDATE marketplace.offer SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1",
    )
    .bind(Uuid::parse_str(offer_id).unwrap())
    .execute(&ctx.pool)
    .await
    .unwrap();
}

async fn stored_status(ctx: &TestContext, offer_id: &str) -> String {
    sqlx::query_scalar("SELECT status::text FROM marketplace.offer WHERE id = $1")
        .bind(Uuid::parse_str(offer_id).unwrap())
        .fetch_one(&ctx.pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_new_offer_after_expiry() {
    let ctx = TestContext::new().await;
    let market = Marketplace::seed(&ctx).await;
    let buyer = bearer(Uuid::new_v4(), false);

    let product = market
        .list_bike(&ctx, json!({ "title": "Canyon Grail", "price": "2200.00" }))
        .await;
    let body = json!({ "product_id": json_str(&product, "id"), "amount": "1900.00" });

    let (status, first) = ctx
        .call(Method::POST, "/api/offers", Some(&buyer), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = json_str(&first, "id");
    lapse(&ctx, &first_id).await;

    let (status, second) = ctx
        .call(Method::POST, "/api/offers", Some(&buyer), Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{second}");
    assert_ne!(json_str(&second, "id"), first_id);
    assert_eq!(stored_status(&ctx, &first_id).await, "expired");
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_acting_on_lapsed_offer_stores_expiry() {
    let ctx = TestContext::new().await;
    let market = Marketplace::seed(&ctx).await;
    let buyer = bearer(Uuid::new_v4(), false);

    let product = market
        .list_bike(&ctx, json!({ "title": "Giant Revolt", "price": "1700.00" }))
        .await;
    let (_, offer) = ctx
        .call(
            Method::POST,
            "/api/offers",
            Some(&buyer),
            Some(json!({ "product_id": json_str(&product, "id"), "amount": "1500.00" })),
        )
        .await;
    let offer_id = json_str(&offer, "id");
    lapse(&ctx, &offer_id).await;

    let (status, _) = ctx
        .call(
            Method::POST,
            &format!("/api/offers/{offer_id}/accept"),
            Some(&market.seller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(stored_status(&ctx, &offer_id).await, "expired");

    let (_, detail) = ctx
        .call(Method::GET, &format!("/api/offers/{offer_id}"), Some(&buyer), None)
        .await;
    assert_eq!(detail["status"], "expired");
}
