//! Status enums for marketplace entities.
//!
//! All enums serialize as `snake_case` strings and, with the `postgres`
//! feature, map onto the Postgres enum types created by the migrations in the
//! `marketplace` schema.

use serde::{Deserialize, Serialize};

/// Listing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Visible only to the store owner.
    #[default]
    Draft,
    /// Listed and purchasable.
    Active,
    /// Paid for; no longer purchasable.
    Sold,
    /// Removed by the owner.
    Archived,
}

/// Curation status of a single product image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.image_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ImageStatus {
    /// The status a curator's click moves the image to.
    ///
    /// pending → approved → rejected → pending
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Pending => Self::Approved,
            Self::Approved => Self::Rejected,
            Self::Rejected => Self::Pending,
        }
    }
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Offer negotiation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.offer_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Opened by the buyer, awaiting the seller.
    #[default]
    Pending,
    /// A counter-offer is awaiting the other party.
    Countered,
    /// Agreed; the buyer may check out at the offer amount.
    Accepted,
    Rejected,
    /// Pulled by the buyer.
    Withdrawn,
    /// No response within the offer TTL.
    Expired,
    /// Paid through checkout.
    Completed,
}

impl OfferStatus {
    /// Whether the negotiation is still in progress.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Countered)
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Countered => "countered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
            Self::Expired => "expired",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Purchase order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

/// Support ticket status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.ticket_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Image discovery job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.discovery_job_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryJobStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl DiscoveryJobStatus {
    /// Whether the job has finished, successfully or not.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Side of a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.party", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Buyer,
    Seller,
}

impl Party {
    /// The other side of the table.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Buyer => Self::Seller,
            Self::Seller => Self::Buyer,
        }
    }
}

/// Physical condition of a listed bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.product_condition", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductCondition {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

impl std::str::FromStr for ProductCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "like_new" => Ok(Self::LikeNew),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            _ => Err(format!("invalid condition: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_status_cycle() {
        assert_eq!(ImageStatus::Pending.next(), ImageStatus::Approved);
        assert_eq!(ImageStatus::Approved.next(), ImageStatus::Rejected);
        assert_eq!(ImageStatus::Rejected.next(), ImageStatus::Pending);
    }

    #[test]
    fn test_image_status_cycle_returns_after_three_steps() {
        let start = ImageStatus::Approved;
        assert_eq!(start.next().next().next(), start);
    }

    #[test]
    fn test_offer_status_open() {
        assert!(OfferStatus::Pending.is_open());
        assert!(OfferStatus::Countered.is_open());
        assert!(!OfferStatus::Accepted.is_open());
        assert!(!OfferStatus::Expired.is_open());
    }

    #[test]
    fn test_party_counterpart() {
        assert_eq!(Party::Buyer.counterpart(), Party::Seller);
        assert_eq!(Party::Seller.counterpart(), Party::Buyer);
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<ProductCondition>("\"like_new\"").unwrap(),
            ProductCondition::LikeNew
        );
    }

    #[test]
    fn test_condition_from_str() {
        assert_eq!("fair".parse::<ProductCondition>(), Ok(ProductCondition::Fair));
        assert!("mint".parse::<ProductCondition>().is_err());
    }
}
