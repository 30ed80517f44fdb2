//! Authentication and request validation at the API edge.
//!
//! Everything here is rejected before the first query, so these tests run
//! without a database.

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use cyclemart_integration_tests::{bearer, call, offline_app};

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = offline_app();

    for (method, uri) in [
        (Method::GET, "/api/orders"),
        (Method::GET, "/api/offers"),
        (Method::POST, "/api/checkout"),
        (Method::GET, "/api/support/tickets"),
        (Method::POST, "/api/stores"),
    ] {
        let (status, body) = call(&app, method.clone(), uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let token = {
        use jsonwebtoken::{EncodingKey, Header, encode};
        let claims = json!({
            "sub": Uuid::new_v4(),
            "aud": "authenticated",
            "exp": chrono::Utc::now().timestamp() - 600,
        });
        let jwt = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(cyclemart_integration_tests::JWT_SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {jwt}")
    };

    let (status, _) = call(&offline_app(), Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_rejected() {
    let (status, _) = call(
        &offline_app(),
        Method::GET,
        "/api/orders",
        Some("Basic dXNlcjpwYXNz"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = offline_app();
    let buyer = bearer(Uuid::new_v4(), false);

    for (method, uri) in [
        (Method::GET, "/api/admin/curation".to_string()),
        (
            Method::POST,
            format!("/api/admin/images/{}/cycle", Uuid::new_v4()),
        ),
        (
            Method::POST,
            format!("/api/admin/products/{}/images/complete", Uuid::new_v4()),
        ),
        (Method::GET, "/api/admin/webhooks/diagnostics".to_string()),
    ] {
        let (status, _) = call(&app, method.clone(), &uri, Some(&buyer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let (status, _) = call(&offline_app(), Method::GET, "/api/admin/curation", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_offer_amount_must_be_a_number() {
    let (status, _) = call(
        &offline_app(),
        Method::POST,
        "/api/offers",
        Some(&bearer(Uuid::new_v4(), false)),
        Some(json!({ "product_id": Uuid::new_v4(), "amount": "lots" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_support_ticket_validation() {
    let app = offline_app();
    let buyer = bearer(Uuid::new_v4(), false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/support/tickets",
        Some(&buyer),
        Some(json!({
            "category": "account",
            "subject": "Hi",
            "description": "I cannot change my email address anywhere.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "subject must be between 5 and 120 characters");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/support/tickets",
        Some(&buyer),
        Some(json!({
            "category": "refund_request",
            "subject": "Refund please",
            "description": "The bike was damaged in transit and unusable.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_signature_is_required() {
    let (status, _) = call(
        &offline_app(),
        Method::POST,
        "/api/webhooks/stripe",
        None,
        Some(json!({ "id": "evt_1", "type": "checkout.session.completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
