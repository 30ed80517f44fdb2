//! Stripe webhook receiver and diagnostics.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tracing::instrument;

use crate::db::{OrderRepository, RepositoryError, WebhookEventRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::WebhookDiagnostics;
use crate::services::stripe::{WebhookEvent, verify_signature};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receive a Stripe event.
///
/// Events are recorded before they are handled so a redelivered event ID is
/// acknowledged without being processed twice. Handling errors are stored on
/// the event row and show up in the diagnostics.
///
/// POST /api/webhooks/stripe
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let secret = state
        .config()
        .stripe
        .webhook_secret
        .as_ref()
        .ok_or_else(|| AppError::Internal("STRIPE_WEBHOOK_SECRET is not configured".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    verify_signature(secret, signature, &body, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook signature");
        AppError::BadRequest("Invalid signature".to_string())
    })?;

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;
    let event: WebhookEvent = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;

    let events = WebhookEventRepository::new(state.pool());
    if !events.record(&event.id, &event.event_type, &payload).await? {
        tracing::info!(event_id = %event.id, "Duplicate webhook delivery ignored");
        return Ok(StatusCode::OK);
    }

    match handle_event(&state, &event).await {
        Ok(()) => events.mark_processed(&event.id).await?,
        Err(e) => {
            tracing::error!(event_id = %event.id, event_type = %event.event_type, error = %e, "Webhook handling failed");
            events.mark_failed(&event.id, &e.to_string()).await?;
        }
    }

    Ok(StatusCode::OK)
}

async fn handle_event(state: &AppState, event: &WebhookEvent) -> std::result::Result<(), RepositoryError> {
    let orders = OrderRepository::new(state.pool());

    match (event.event_type.as_str(), event.session_id()) {
        ("checkout.session.completed", Some(session_id)) => {
            match orders.mark_paid(session_id).await? {
                Some(order) => {
                    tracing::info!(order_id = %order.id, product_id = %order.product_id, "Order paid");
                }
                None => tracing::warn!(session_id, "No pending order for completed session"),
            }
        }
        ("checkout.session.expired", Some(session_id)) => {
            if orders.mark_cancelled(session_id).await? {
                tracing::info!(session_id, "Order cancelled after session expiry");
            }
        }
        (other, _) => tracing::debug!(event_type = other, "Ignoring webhook event"),
    }
    Ok(())
}

/// GET /api/admin/webhooks/diagnostics
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn diagnostics(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<WebhookDiagnostics>> {
    let configured = state.config().stripe.webhook_secret.is_some();
    let diagnostics = WebhookEventRepository::new(state.pool())
        .diagnostics(configured)
        .await?;
    Ok(Json(diagnostics))
}
