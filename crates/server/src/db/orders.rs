//! Purchase order repository.

use rust_decimal::Decimal;
use sqlx::PgPool;

use cyclemart_core::{OfferId, OrderId, ProductId, ProfileId};

use super::RepositoryError;
use crate::models::Order;

const ORDER_COLUMNS: &str = "id, buyer_id, product_id, offer_id, status, item_amount, \
    delivery_fee, total_amount, currency, stripe_session_id, paid_at, created_at";

/// Amounts of an order about to be sent to checkout.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub buyer_id: ProfileId,
    pub product_id: ProductId,
    pub offer_id: Option<OfferId>,
    pub item_amount: Decimal,
    pub delivery_fee: Decimal,
    pub currency: String,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `pending` order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_pending(&self, order: &PendingOrder) -> Result<Order, RepositoryError> {
        let created = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO marketplace.purchase_order
                (buyer_id, product_id, offer_id, item_amount, delivery_fee, total_amount, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.buyer_id)
        .bind(order.product_id)
        .bind(order.offer_id)
        .bind(order.item_amount)
        .bind(order.delivery_fee)
        .bind(order.item_amount + order.delivery_fee)
        .bind(&order.currency)
        .fetch_one(self.pool)
        .await?;
        Ok(created)
    }

    /// Remember the checkout session created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn attach_session(&self, id: OrderId, session_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.purchase_order
            SET stripe_session_id = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(session_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.purchase_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// A buyer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_buyer(&self, buyer: ProfileId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM marketplace.purchase_order
            WHERE buyer_id = $1
            ORDER BY created_at DESC
            "
        ))
        .bind(buyer)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Whether `buyer` placed order `id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn belongs_to(&self, id: OrderId, buyer: ProfileId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM marketplace.purchase_order WHERE id = $1 AND buyer_id = $2
            )
            ",
        )
        .bind(id)
        .bind(buyer)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Settle a paid checkout session.
    ///
    /// In one transaction: the order becomes `paid`, the product `sold`, and
    /// the negotiated offer (if any) `completed`. Returns `None` when no
    /// pending order has this session, which makes redelivery harmless.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn mark_paid(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(order) = sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE marketplace.purchase_order
            SET status = 'paid', paid_at = NOW(), updated_at = NOW()
            WHERE stripe_session_id = $1 AND status = 'pending'
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE marketplace.product SET status = 'sold', updated_at = NOW() WHERE id = $1",
        )
        .bind(order.product_id)
        .execute(&mut *tx)
        .await?;

        if let Some(offer_id) = order.offer_id {
            sqlx::query(
                r"
                UPDATE marketplace.offer SET status = 'completed', updated_at = NOW()
                WHERE id = $1 AND status = 'accepted'
                ",
            )
            .bind(offer_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(order))
    }

    /// Cancel the pending order of an expired checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_cancelled(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.purchase_order
            SET status = 'cancelled', updated_at = NOW()
            WHERE stripe_session_id = $1 AND status = 'pending'
            ",
        )
        .bind(session_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
