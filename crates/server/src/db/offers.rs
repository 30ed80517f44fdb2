//! Offer repository.
//!
//! State changes are written with an optimistic guard on the previous status
//! and round, so two parties acting at once cannot both win.

use rust_decimal::Decimal;
use sqlx::PgPool;

use cyclemart_core::offers::Negotiation;
use cyclemart_core::{OfferId, Party, ProductId, ProfileId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Offer, OfferEvent};

const OFFER_COLUMNS: &str = "id, product_id, buyer_id, seller_id, status, amount, asking_price, \
    last_actor, round, message, expires_at, created_at, updated_at";

/// Repository for offer database operations.
pub struct OfferRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OfferRepository<'a> {
    /// Create a new offer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open an offer and record the opening event.
    ///
    /// The buyer's earlier offers on the product that lapsed while still open
    /// are marked expired first, so they no longer count as open.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the buyer already has an open
    /// offer on this product.
    pub async fn create(
        &self,
        product_id: ProductId,
        buyer_id: ProfileId,
        seller_id: ProfileId,
        negotiation: &Negotiation,
        message: Option<&str>,
    ) -> Result<Offer, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE marketplace.offer
            SET status = 'expired', updated_at = NOW()
            WHERE product_id = $1 AND buyer_id = $2
              AND status IN ('pending', 'countered')
              AND expires_at < NOW()
            ",
        )
        .bind(product_id)
        .bind(buyer_id)
        .execute(&mut *tx)
        .await?;

        let offer = sqlx::query_as::<_, Offer>(&format!(
            r"
            INSERT INTO marketplace.offer
                (product_id, buyer_id, seller_id, status, amount, asking_price,
                 last_actor, round, message, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {OFFER_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(buyer_id)
        .bind(seller_id)
        .bind(negotiation.status)
        .bind(negotiation.amount)
        .bind(negotiation.asking_price)
        .bind(negotiation.last_actor)
        .bind(negotiation.round)
        .bind(message)
        .bind(negotiation.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique(
            "you already have an open offer on this product",
        ))?;

        sqlx::query(
            r"
            INSERT INTO marketplace.offer_event (offer_id, actor, action, amount)
            VALUES ($1, 'buyer', 'open', $2)
            ",
        )
        .bind(offer.id)
        .bind(offer.amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(offer)
    }

    /// Get an offer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OfferId) -> Result<Option<Offer>, RepositoryError> {
        let offer = sqlx::query_as::<_, Offer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM marketplace.offer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(offer)
    }

    /// Offers where `profile` is on the given side, newest activity first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for(
        &self,
        profile: ProfileId,
        role: Party,
    ) -> Result<Vec<Offer>, RepositoryError> {
        let column = match role {
            Party::Buyer => "buyer_id",
            Party::Seller => "seller_id",
        };
        let offers = sqlx::query_as::<_, Offer>(&format!(
            r"
            SELECT {OFFER_COLUMNS} FROM marketplace.offer
            WHERE {column} = $1
            ORDER BY updated_at DESC
            LIMIT 200
            "
        ))
        .bind(profile)
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Persist a negotiation step and its history event.
    ///
    /// The update only applies if the offer still has the status and round
    /// `current` was read with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the offer changed since it was read.
    pub async fn apply(
        &self,
        current: &Offer,
        next: &Negotiation,
        actor: Party,
        action: &str,
        amount: Option<Decimal>,
    ) -> Result<Offer, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Offer>(&format!(
            r"
            UPDATE marketplace.offer
            SET status = $4, amount = $5, last_actor = $6, round = $7,
                expires_at = $8, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND round = $3
            RETURNING {OFFER_COLUMNS}
            "
        ))
        .bind(current.id)
        .bind(current.status)
        .bind(current.round)
        .bind(next.status)
        .bind(next.amount)
        .bind(next.last_actor)
        .bind(next.round)
        .bind(next.expires_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::Conflict("offer was updated by the other party, reload it".to_owned())
        })?;

        sqlx::query(
            r"
            INSERT INTO marketplace.offer_event (offer_id, actor, action, amount)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(current.id)
        .bind(actor)
        .bind(action)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Store the expired status of an open offer past its expiry.
    ///
    /// Returns `false` when the offer was already closed or is not yet due.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn expire(&self, id: OfferId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.offer
            SET status = 'expired', updated_at = NOW()
            WHERE id = $1
              AND status IN ('pending', 'countered')
              AND expires_at < NOW()
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// History of an offer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn events(&self, id: OfferId) -> Result<Vec<OfferEvent>, RepositoryError> {
        let events = sqlx::query_as::<_, OfferEvent>(
            r"
            SELECT actor, action, amount, created_at
            FROM marketplace.offer_event
            WHERE offer_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(events)
    }
}
