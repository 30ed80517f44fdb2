//! Checkout and buyer order routes.

use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cyclemart_core::delivery;
use cyclemart_core::{OfferId, OrderId, ProductId, ProductStatus, to_minor_units};

use super::ensure_profile;
use super::extract::ApiJson;
use crate::db::orders::PendingOrder;
use crate::db::{OfferRepository, OrderRepository, ProductRepository, StoreRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::stripe::{CheckoutRequest, LineItem};
use crate::state::AppState;

/// Body of `POST /api/checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub product_id: ProductId,
    pub offer_id: Option<OfferId>,
    pub distance_km: Option<Decimal>,
}

/// Response of `POST /api/checkout`.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub session_id: String,
    pub url: Option<String>,
}

/// Start a Stripe Checkout for a listing.
///
/// The price is the asking price, or the amount of the buyer's accepted
/// offer when `offer_id` is given.
///
/// POST /api/checkout
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> Result<Json<CheckoutResponse>> {
    let product = ProductRepository::new(state.pool())
        .get(body.product_id)
        .await?
        .filter(|p| p.status == ProductStatus::Active)
        .ok_or_else(|| AppError::NotFound("Product is not available".to_string()))?;

    let store = StoreRepository::new(state.pool())
        .get(product.store_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("store {} missing", product.store_id)))?;
    if store.owner_id == user.id {
        return Err(AppError::BadRequest(
            "You cannot buy your own listing".to_string(),
        ));
    }

    let item_amount = match body.offer_id {
        None => product.price,
        Some(offer_id) => {
            let offer = OfferRepository::new(state.pool())
                .get(offer_id)
                .await?
                .filter(|o| o.buyer_id == user.id)
                .ok_or_else(|| AppError::NotFound("Offer not found".to_string()))?;
            if offer.product_id != product.id || !offer.negotiation().payable(Utc::now()) {
                return Err(AppError::Conflict(
                    "Offer is not accepted for this product or has expired".to_string(),
                ));
            }
            offer.amount
        }
    };

    let delivery_fee = match body.distance_km {
        Some(distance) => delivery::quote(&store.delivery, item_amount, distance)?.fee,
        None => Decimal::ZERO,
    };

    let mut line_items = vec![LineItem {
        name: product.title.clone(),
        unit_amount: to_minor_units(item_amount)?,
    }];
    if !delivery_fee.is_zero() {
        line_items.push(LineItem {
            name: format!("Delivery from {}", store.name),
            unit_amount: to_minor_units(delivery_fee)?,
        });
    }

    ensure_profile(&state, &user).await?;
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .create_pending(&PendingOrder {
            buyer_id: user.id,
            product_id: product.id,
            offer_id: body.offer_id,
            item_amount,
            delivery_fee,
            currency: state.stripe().currency().to_string(),
        })
        .await?;

    let base_url = &state.config().base_url;
    let session = state
        .stripe()
        .create_checkout_session(&CheckoutRequest {
            order_id: order.id,
            product_id: product.id,
            customer_email: user.email.clone(),
            line_items,
            success_url: format!("{base_url}/checkout/success?order_id={}", order.id),
            cancel_url: format!("{base_url}/products/{}", product.id),
        })
        .await?;

    orders.attach_session(order.id, &session.id).await?;

    let order_id = order.id.to_string();
    add_breadcrumb(
        "checkout",
        "Checkout session created",
        Some(&[("order_id", &order_id), ("session_id", &session.id)]),
    );
    tracing::info!(order_id = %order.id, session_id = %session.id, total = %order.total_amount, "Checkout started");

    Ok(Json(CheckoutResponse {
        order_id: order.id,
        session_id: session.id,
        url: session.url,
    }))
}

/// The caller's orders, newest first.
///
/// GET /api/orders
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_buyer(user.id)
        .await?;
    Ok(Json(orders))
}
