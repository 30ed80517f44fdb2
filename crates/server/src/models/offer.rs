//! Offer domain types.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cyclemart_core::offers::Negotiation;
use cyclemart_core::{OfferId, OfferStatus, Party, ProductId, ProfileId};

/// An offer on a listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Offer {
    pub id: OfferId,
    pub product_id: ProductId,
    pub buyer_id: ProfileId,
    pub seller_id: ProfileId,
    pub status: OfferStatus,
    pub amount: Decimal,
    pub asking_price: Decimal,
    pub last_actor: Party,
    pub round: i32,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// The negotiable part of the offer.
    #[must_use]
    pub const fn negotiation(&self) -> Negotiation {
        Negotiation {
            status: self.status,
            amount: self.amount,
            asking_price: self.asking_price,
            last_actor: self.last_actor,
            round: self.round,
            expires_at: self.expires_at,
        }
    }

    /// Which side `profile` is on, if any.
    #[must_use]
    pub fn party_of(&self, profile: ProfileId) -> Option<Party> {
        if profile == self.buyer_id {
            Some(Party::Buyer)
        } else if profile == self.seller_id {
            Some(Party::Seller)
        } else {
            None
        }
    }

    /// The offer as readers should see it at `now` (lapsed offers read as expired).
    #[must_use]
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.negotiation().effective_status(now);
        self
    }
}

/// One step in an offer's history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OfferEvent {
    pub actor: Party,
    pub action: String,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// An offer with its history.
#[derive(Debug, Clone, Serialize)]
pub struct OfferDetail {
    #[serde(flatten)]
    pub offer: Offer,
    pub events: Vec<OfferEvent>,
}

/// Body of `POST /api/offers`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub product_id: ProductId,
    pub amount: Decimal,
    pub message: Option<String>,
}

/// Body of `POST /api/offers/{id}/counter`.
#[derive(Debug, Clone, Deserialize)]
pub struct CounterOffer {
    pub amount: Decimal,
}

/// Query for `GET /api/offers`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OfferListQuery {
    #[serde(default = "default_role")]
    pub role: Party,
}

const fn default_role() -> Party {
    Party::Buyer
}

/// Offer lifetime from configuration hours.
#[must_use]
pub const fn offer_ttl(hours: i64) -> Duration {
    Duration::hours(hours)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn offer() -> Offer {
        let created = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        Offer {
            id: OfferId::new(Uuid::from_u128(1)),
            product_id: ProductId::new(Uuid::from_u128(2)),
            buyer_id: ProfileId::new(Uuid::from_u128(3)),
            seller_id: ProfileId::new(Uuid::from_u128(4)),
            status: OfferStatus::Pending,
            amount: Decimal::new(800, 0),
            asking_price: Decimal::new(1000, 0),
            last_actor: Party::Buyer,
            round: 1,
            message: None,
            expires_at: created + Duration::hours(48),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_party_of() {
        let offer = offer();
        assert_eq!(offer.party_of(offer.buyer_id), Some(Party::Buyer));
        assert_eq!(offer.party_of(offer.seller_id), Some(Party::Seller));
        assert_eq!(offer.party_of(ProfileId::new(Uuid::from_u128(9))), None);
    }

    #[test]
    fn test_observed_after_expiry() {
        let offer = offer();
        let later = offer.expires_at + Duration::minutes(1);
        assert_eq!(offer.observed_at(later).status, OfferStatus::Expired);
    }

    #[test]
    fn test_list_query_defaults_to_buyer() {
        let query: OfferListQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.role, Party::Buyer);
    }
}
