//! Support ticket lifecycle.

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use cyclemart_integration_tests::{TestContext, bearer, json_str};

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_ticket_lifecycle() {
    let ctx = TestContext::new().await;
    let buyer = bearer(Uuid::new_v4(), false);
    let admin = bearer(Uuid::new_v4(), true);
    let stranger = bearer(Uuid::new_v4(), false);

    let (status, ticket) = ctx
        .call(
            Method::POST,
            "/api/support/tickets",
            Some(&buyer),
            Some(json!({
                "category": "account",
                "subject": "  Cannot change email  ",
                "description": "The settings page errors when I save a new address.",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["subject"], "Cannot change email");

    let id = json_str(&ticket, "id");
    let messages = format!("/api/support/tickets/{id}/messages");
    let set_status = format!("/api/admin/support/tickets/{id}/status");

    let (status, _) = ctx
        .call(
            Method::POST,
            &messages,
            Some(&buyer),
            Some(json!({ "body": "Screenshot attached in the next message." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    for next in ["in_progress", "resolved"] {
        let (status, updated) = ctx
            .call(Method::PUT, &set_status, Some(&admin), Some(json!({ "status": next })))
            .await;
        assert_eq!(status, StatusCode::OK, "{updated}");
        assert_eq!(updated["status"], next);
    }

    // Staff replies leave the status alone.
    let (status, reply) = ctx
        .call(
            Method::POST,
            &messages,
            Some(&admin),
            Some(json!({ "body": "Fixed on our side, please retry." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["from_staff"], true);

    // A buyer reply reopens a resolved ticket.
    let (status, _) = ctx
        .call(Method::POST, &messages, Some(&buyer), Some(json!({ "body": "Still broken." })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, detail) = ctx
        .call(Method::GET, &format!("/api/support/tickets/{id}"), Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "open");
    assert_eq!(detail["messages"].as_array().unwrap().len(), 3);

    // Resolved cannot jump back to in_progress.
    let (status, _) = ctx
        .call(Method::PUT, &set_status, Some(&admin), Some(json!({ "status": "resolved" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .call(Method::PUT, &set_status, Some(&admin), Some(json!({ "status": "closed" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .call(Method::POST, &messages, Some(&buyer), Some(json!({ "body": "Hello?" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .call(Method::GET, &format!("/api/support/tickets/{id}"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listed) = ctx
        .call(Method::GET, "/api/support/tickets", Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (CYCLEMART_TEST_DATABASE_URL)"]
async fn test_ticket_cannot_reference_someone_elses_order() {
    let ctx = TestContext::new().await;
    let buyer = bearer(Uuid::new_v4(), false);

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/support/tickets",
            Some(&buyer),
            Some(json!({
                "category": "item_not_received",
                "order_id": Uuid::new_v4(),
                "subject": "Where is my bike",
                "description": "Tracking has not moved in two weeks.",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}
