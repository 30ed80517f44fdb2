//! Purchase order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use cyclemart_core::{OfferId, OrderId, OrderStatus, ProductId, ProfileId};

/// A checkout order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: ProfileId,
    pub product_id: ProductId,
    pub offer_id: Option<OfferId>,
    pub status: OrderStatus,
    pub item_amount: Decimal,
    pub delivery_fee: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub stripe_session_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
