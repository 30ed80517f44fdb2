//! Offer / counter-offer negotiation.
//!
//! A buyer opens an offer below (or at) the asking price. From then on the
//! parties alternate: whoever did not name the current amount may accept,
//! reject or counter. The buyer may withdraw an open offer at any time.
//! Every state change pushes the expiry out by the configured TTL; an offer
//! nobody answers before then is expired.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OfferStatus, Party, decimal_places};

/// Maximum number of amounts (the opening offer plus counters) per negotiation.
pub const MAX_ROUNDS: i32 = 10;

/// Errors raised by negotiation actions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("offer amount must be greater than zero")]
    NonPositiveAmount,
    #[error("offer amount cannot have more than two decimal places")]
    TooPrecise,
    #[error("offer amount cannot exceed the asking price of {0}")]
    AboveAskingPrice(Decimal),
    #[error("counter-offer must change the amount")]
    SameAmount,
    #[error("waiting for the other party to respond")]
    NotYourTurn,
    #[error("only the buyer can withdraw an offer")]
    BuyerOnly,
    #[error("offer is already {0}")]
    Closed(OfferStatus),
    #[error("offer has expired")]
    Expired,
    #[error("negotiation limit of {MAX_ROUNDS} rounds reached")]
    TooManyRounds,
}

/// Something a participant does to an open offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "amount", rename_all = "snake_case")]
pub enum OfferAction {
    Accept,
    Reject,
    Counter(Decimal),
    Withdraw,
}

impl OfferAction {
    /// Short name recorded in the offer history.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Counter(_) => "counter",
            Self::Withdraw => "withdraw",
        }
    }
}

/// Check that an amount can be offered against `asking_price`.
///
/// # Errors
///
/// Returns an [`OfferError`] for non-positive amounts, sub-cent precision or
/// amounts above the asking price.
pub fn validate_amount(amount: Decimal, asking_price: Decimal) -> Result<(), OfferError> {
    if amount <= Decimal::ZERO {
        return Err(OfferError::NonPositiveAmount);
    }
    if decimal_places(amount) > 2 {
        return Err(OfferError::TooPrecise);
    }
    if amount > asking_price {
        return Err(OfferError::AboveAskingPrice(asking_price));
    }
    Ok(())
}

/// The negotiable state of an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    pub status: OfferStatus,
    pub amount: Decimal,
    pub asking_price: Decimal,
    /// Who named the current amount.
    pub last_actor: Party,
    pub round: i32,
    pub expires_at: DateTime<Utc>,
}

impl Negotiation {
    /// Open a negotiation with the buyer's first amount.
    ///
    /// # Errors
    ///
    /// See [`validate_amount`].
    pub fn open(
        amount: Decimal,
        asking_price: Decimal,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, OfferError> {
        validate_amount(amount, asking_price)?;
        Ok(Self {
            status: OfferStatus::Pending,
            amount,
            asking_price,
            last_actor: Party::Buyer,
            round: 1,
            expires_at: now + ttl,
        })
    }

    /// Status as observed at `now`: open offers past their expiry read as expired.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> OfferStatus {
        if self.status.is_open() && now > self.expires_at {
            OfferStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether the buyer can pay this offer's amount at `now`.
    #[must_use]
    pub fn payable(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Accepted && now <= self.expires_at
    }

    /// Apply `action` by `actor`, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns an [`OfferError`] when the offer is closed or expired, when it
    /// is not `actor`'s turn, or when a counter amount is invalid.
    pub fn apply(
        &self,
        actor: Party,
        action: &OfferAction,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, OfferError> {
        match self.effective_status(now) {
            OfferStatus::Expired => return Err(OfferError::Expired),
            status if !status.is_open() => return Err(OfferError::Closed(status)),
            _ => {}
        }

        let mut next = self.clone();
        next.expires_at = now + ttl;

        match action {
            OfferAction::Withdraw => {
                if actor != Party::Buyer {
                    return Err(OfferError::BuyerOnly);
                }
                next.status = OfferStatus::Withdrawn;
            }
            _ if actor == self.last_actor => return Err(OfferError::NotYourTurn),
            OfferAction::Accept => next.status = OfferStatus::Accepted,
            OfferAction::Reject => next.status = OfferStatus::Rejected,
            OfferAction::Counter(amount) => {
                validate_amount(*amount, self.asking_price)?;
                if *amount == self.amount {
                    return Err(OfferError::SameAmount);
                }
                if self.round >= MAX_ROUNDS {
                    return Err(OfferError::TooManyRounds);
                }
                next.status = OfferStatus::Countered;
                next.amount = *amount;
                next.last_actor = actor;
                next.round += 1;
            }
        }

        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn ttl() -> Duration {
        Duration::hours(48)
    }

    fn opened() -> Negotiation {
        Negotiation::open(Decimal::new(800, 0), Decimal::new(1000, 0), now(), ttl()).unwrap()
    }

    #[test]
    fn test_open_validates_amount() {
        let asking = Decimal::new(1000, 0);
        assert_eq!(
            Negotiation::open(Decimal::ZERO, asking, now(), ttl()),
            Err(OfferError::NonPositiveAmount)
        );
        assert_eq!(
            Negotiation::open(Decimal::new(1001, 0), asking, now(), ttl()),
            Err(OfferError::AboveAskingPrice(asking))
        );
        assert_eq!(
            Negotiation::open(Decimal::new(10_001, 3), asking, now(), ttl()),
            Err(OfferError::TooPrecise)
        );
        assert!(Negotiation::open(asking, asking, now(), ttl()).is_ok());
    }

    #[test]
    fn test_seller_counters_then_buyer_accepts() {
        let offer = opened();
        let countered = offer
            .apply(Party::Seller, &OfferAction::Counter(Decimal::new(900, 0)), now(), ttl())
            .unwrap();
        assert_eq!(countered.status, OfferStatus::Countered);
        assert_eq!(countered.last_actor, Party::Seller);
        assert_eq!(countered.round, 2);

        let accepted = countered
            .apply(Party::Buyer, &OfferAction::Accept, now(), ttl())
            .unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);
        assert_eq!(accepted.amount, Decimal::new(900, 0));
        assert!(accepted.payable(now()));
    }

    #[test]
    fn test_buyer_cannot_answer_own_offer() {
        let offer = opened();
        assert_eq!(
            offer.apply(Party::Buyer, &OfferAction::Accept, now(), ttl()),
            Err(OfferError::NotYourTurn)
        );
    }

    #[test]
    fn test_only_buyer_withdraws() {
        let offer = opened();
        assert_eq!(
            offer.apply(Party::Seller, &OfferAction::Withdraw, now(), ttl()),
            Err(OfferError::BuyerOnly)
        );
        let withdrawn = offer
            .apply(Party::Buyer, &OfferAction::Withdraw, now(), ttl())
            .unwrap();
        assert_eq!(withdrawn.status, OfferStatus::Withdrawn);
    }

    #[test]
    fn test_closed_offer_rejects_actions() {
        let rejected = opened()
            .apply(Party::Seller, &OfferAction::Reject, now(), ttl())
            .unwrap();
        assert_eq!(
            rejected.apply(Party::Buyer, &OfferAction::Withdraw, now(), ttl()),
            Err(OfferError::Closed(OfferStatus::Rejected))
        );
    }

    #[test]
    fn test_expired_offer() {
        let offer = opened();
        let later = now() + Duration::hours(49);
        assert_eq!(offer.effective_status(later), OfferStatus::Expired);
        assert_eq!(
            offer.apply(Party::Seller, &OfferAction::Accept, later, ttl()),
            Err(OfferError::Expired)
        );
    }

    #[test]
    fn test_accepted_offer_stops_being_payable_after_ttl() {
        let accepted = opened()
            .apply(Party::Seller, &OfferAction::Accept, now(), ttl())
            .unwrap();
        assert!(!accepted.payable(now() + Duration::hours(49)));
        assert_eq!(
            accepted.effective_status(now() + Duration::hours(49)),
            OfferStatus::Accepted
        );
    }

    #[test]
    fn test_counter_must_change_amount() {
        let offer = opened();
        assert_eq!(
            offer.apply(Party::Seller, &OfferAction::Counter(offer.amount), now(), ttl()),
            Err(OfferError::SameAmount)
        );
    }

    #[test]
    fn test_round_limit() {
        let mut offer = opened();
        let mut actor = Party::Seller;
        let mut amount = 801;
        while offer.round < MAX_ROUNDS {
            offer = offer
                .apply(actor, &OfferAction::Counter(Decimal::new(amount, 0)), now(), ttl())
                .unwrap();
            actor = actor.counterpart();
            amount += 1;
        }
        assert_eq!(
            offer.apply(actor, &OfferAction::Counter(Decimal::new(amount, 0)), now(), ttl()),
            Err(OfferError::TooManyRounds)
        );
    }

    #[test]
    fn test_action_serde() {
        let action: OfferAction =
            serde_json::from_str(r#"{"action":"counter","amount":"950.00"}"#).unwrap();
        assert_eq!(action, OfferAction::Counter(Decimal::new(95_000, 2)));
    }
}
