//! Support ticket domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cyclemart_core::support::TicketCategory;
use cyclemart_core::{OrderId, ProfileId, TicketId, TicketMessageId, TicketStatus};

/// A buyer-support ticket.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: TicketId,
    pub profile_id: ProfileId,
    pub order_id: Option<OrderId>,
    pub category: TicketCategory,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reply on a ticket thread.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub author_id: ProfileId,
    pub from_staff: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A ticket with its thread.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}
