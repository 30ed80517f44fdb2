//! Buyer-support tickets.
//!
//! The support wizard collects a category, an optional order reference, a
//! subject and a description. Order-related categories must reference an
//! order; whether the order belongs to the buyer is checked by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OrderId, TicketStatus};

pub const SUBJECT_MIN: usize = 5;
pub const SUBJECT_MAX: usize = 120;
pub const DESCRIPTION_MIN: usize = 20;
pub const DESCRIPTION_MAX: usize = 5000;
pub const MESSAGE_MAX: usize = 5000;

/// Errors raised by ticket validation and transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },
    #[error("this category requires an order")]
    OrderRequired,
    #[error("cannot move ticket from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },
    #[error("ticket is closed")]
    Closed,
}

/// What the buyer needs help with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.ticket_category", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    ItemNotReceived,
    ItemNotAsDescribed,
    PaymentIssue,
    RefundRequest,
    Account,
    Other,
}

impl TicketCategory {
    /// Whether tickets in this category must reference one of the buyer's orders.
    #[must_use]
    pub const fn requires_order(self) -> bool {
        matches!(
            self,
            Self::ItemNotReceived | Self::ItemNotAsDescribed | Self::PaymentIssue | Self::RefundRequest
        )
    }
}

/// The wizard's submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TicketDraft {
    pub category: TicketCategory,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub description: String,
}

/// A draft that passed validation, with text trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTicket {
    pub category: TicketCategory,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub description: String,
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, TicketError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(TicketError::Length { field, min, max });
    }
    Ok(trimmed.to_owned())
}

impl TicketDraft {
    /// Validate the wizard's fields.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::OrderRequired`] when an order-related category
    /// has no order, or [`TicketError::Length`] for out-of-range text.
    pub fn validate(self) -> Result<ValidTicket, TicketError> {
        if self.category.requires_order() && self.order_id.is_none() {
            return Err(TicketError::OrderRequired);
        }

        Ok(ValidTicket {
            category: self.category,
            order_id: self.order_id,
            subject: check_length("subject", &self.subject, SUBJECT_MIN, SUBJECT_MAX)?,
            description: check_length(
                "description",
                &self.description,
                DESCRIPTION_MIN,
                DESCRIPTION_MAX,
            )?,
        })
    }
}

/// Validate a reply on a ticket thread.
///
/// # Errors
///
/// Returns [`TicketError::Length`] for empty or oversized messages.
pub fn validate_message(body: &str) -> Result<String, TicketError> {
    check_length("message", body, 1, MESSAGE_MAX)
}

/// Check a staff status change.
///
/// # Errors
///
/// Returns [`TicketError::InvalidTransition`] for anything outside
/// open → in_progress → resolved → closed, plus the reopen paths.
pub fn transition(from: TicketStatus, to: TicketStatus) -> Result<TicketStatus, TicketError> {
    use TicketStatus::{Closed, InProgress, Open, Resolved};

    match (from, to) {
        (Open, InProgress | Closed)
        | (InProgress, Resolved | Open)
        | (Resolved, Closed | Open) => Ok(to),
        _ => Err(TicketError::InvalidTransition { from, to }),
    }
}

/// Status after the buyer posts a message.
///
/// # Errors
///
/// Returns [`TicketError::Closed`] for closed tickets.
pub const fn after_buyer_message(status: TicketStatus) -> Result<TicketStatus, TicketError> {
    match status {
        TicketStatus::Closed => Err(TicketError::Closed),
        TicketStatus::Resolved => Ok(TicketStatus::Open),
        other => Ok(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn draft(category: TicketCategory, order: bool) -> TicketDraft {
        TicketDraft {
            category,
            order_id: order.then(|| OrderId::new(Uuid::from_u128(7))),
            subject: "  Wheel arrived bent  ".to_string(),
            description: "The front wheel is visibly out of true.".to_string(),
        }
    }

    #[test]
    fn test_valid_draft_is_trimmed() {
        let ticket = draft(TicketCategory::ItemNotAsDescribed, true).validate().unwrap();
        assert_eq!(ticket.subject, "Wheel arrived bent");
    }

    #[test]
    fn test_order_required_for_order_categories() {
        assert_eq!(
            draft(TicketCategory::ItemNotReceived, false).validate(),
            Err(TicketError::OrderRequired)
        );
        assert!(draft(TicketCategory::Account, false).validate().is_ok());
    }

    #[test]
    fn test_subject_length() {
        let mut d = draft(TicketCategory::Other, false);
        d.subject = "Hi  ".to_string();
        assert!(matches!(
            d.validate(),
            Err(TicketError::Length { field: "subject", .. })
        ));
    }

    #[test]
    fn test_description_length() {
        let mut d = draft(TicketCategory::Other, false);
        d.description = "too short".to_string();
        assert!(matches!(
            d.validate(),
            Err(TicketError::Length {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn test_message_validation() {
        assert!(validate_message("   ").is_err());
        assert_eq!(validate_message(" thanks ").unwrap(), "thanks");
        assert!(validate_message(&"x".repeat(MESSAGE_MAX + 1)).is_err());
    }

    #[test]
    fn test_transitions() {
        use TicketStatus::{Closed, InProgress, Open, Resolved};

        assert_eq!(transition(Open, InProgress), Ok(InProgress));
        assert_eq!(transition(InProgress, Resolved), Ok(Resolved));
        assert_eq!(transition(Resolved, Closed), Ok(Closed));
        assert_eq!(transition(Resolved, Open), Ok(Open));
        assert!(transition(Closed, Open).is_err());
        assert!(transition(Open, Resolved).is_err());
        assert!(transition(Open, Open).is_err());
    }

    #[test]
    fn test_buyer_message_reopens_resolved() {
        assert_eq!(after_buyer_message(TicketStatus::Resolved), Ok(TicketStatus::Open));
        assert_eq!(
            after_buyer_message(TicketStatus::InProgress),
            Ok(TicketStatus::InProgress)
        );
        assert_eq!(
            after_buyer_message(TicketStatus::Closed),
            Err(TicketError::Closed)
        );
    }
}
