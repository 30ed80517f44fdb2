//! Support ticket repository.

use sqlx::PgPool;

use cyclemart_core::support::ValidTicket;
use cyclemart_core::{ProfileId, TicketId, TicketStatus};

use super::RepositoryError;
use crate::models::{Ticket, TicketMessage};

const TICKET_COLUMNS: &str =
    "id, profile_id, order_id, category, subject, description, status, created_at, updated_at";

/// Repository for support tickets and their threads.
pub struct SupportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SupportRepository<'a> {
    /// Create a new support repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a ticket for `profile`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        profile: ProfileId,
        ticket: &ValidTicket,
    ) -> Result<Ticket, RepositoryError> {
        let created = sqlx::query_as::<_, Ticket>(&format!(
            r"
            INSERT INTO marketplace.support_ticket
                (profile_id, order_id, category, subject, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(profile)
        .bind(ticket.order_id)
        .bind(ticket.category)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .fetch_one(self.pool)
        .await?;
        Ok(created)
    }

    /// A profile's tickets, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for(&self, profile: ProfileId) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            r"
            SELECT {TICKET_COLUMNS} FROM marketplace.support_ticket
            WHERE profile_id = $1
            ORDER BY updated_at DESC
            "
        ))
        .bind(profile)
        .fetch_all(self.pool)
        .await?;
        Ok(tickets)
    }

    /// Get a ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM marketplace.support_ticket WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(ticket)
    }

    /// A ticket's thread, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(&self, id: TicketId) -> Result<Vec<TicketMessage>, RepositoryError> {
        let messages = sqlx::query_as::<_, TicketMessage>(
            r"
            SELECT id, author_id, from_staff, body, created_at
            FROM marketplace.ticket_message
            WHERE ticket_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(messages)
    }

    /// Append a message and move the ticket to `status` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn add_message(
        &self,
        ticket: TicketId,
        author: ProfileId,
        from_staff: bool,
        body: &str,
        status: TicketStatus,
    ) -> Result<TicketMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, TicketMessage>(
            r"
            INSERT INTO marketplace.ticket_message (ticket_id, author_id, from_staff, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, author_id, from_staff, body, created_at
            ",
        )
        .bind(ticket)
        .bind(author)
        .bind(from_staff)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE marketplace.support_ticket SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(ticket)
        .bind(status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Move a ticket from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ticket is no longer in `from`.
    pub async fn set_status(
        &self,
        id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<Ticket, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r"
            UPDATE marketplace.support_ticket
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool)
        .await?;
        ticket.ok_or_else(|| RepositoryError::Conflict("ticket status changed, reload it".to_owned()))
    }
}
