//! Buyer support tickets.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use cyclemart_core::support::{self, TicketDraft, TicketError};
use cyclemart_core::{TicketId, TicketStatus};

use super::ensure_profile;
use super::extract::{ApiJson, ApiPath};
use crate::db::{OrderRepository, SupportRepository};
use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, RequireAdmin, RequireAuth};
use crate::models::{Ticket, TicketDetail};
use crate::state::AppState;

/// Body of `POST /api/support/tickets/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub body: String,
}

/// Body of `PUT /api/admin/support/tickets/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: TicketStatus,
}

/// Load a ticket visible to `user`: its owner or staff.
async fn visible_ticket(state: &AppState, id: TicketId, user: &AuthUser) -> Result<Ticket> {
    SupportRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|t| t.profile_id == user.id || user.is_admin)
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))
}

/// Submit the support wizard.
///
/// POST /api/support/tickets
#[instrument(skip(state, user, draft), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(draft): ApiJson<TicketDraft>,
) -> Result<impl IntoResponse> {
    let ticket = draft.validate()?;

    if let Some(order_id) = ticket.order_id {
        let owned = OrderRepository::new(state.pool())
            .belongs_to(order_id, user.id)
            .await?;
        if !owned {
            return Err(AppError::BadRequest(
                "The referenced order was not found".to_string(),
            ));
        }
    }

    ensure_profile(&state, &user).await?;
    let created = SupportRepository::new(state.pool())
        .create(user.id, &ticket)
        .await?;

    tracing::info!(ticket_id = %created.id, category = ?created.category, "Support ticket opened");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/support/tickets
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Ticket>>> {
    let tickets = SupportRepository::new(state.pool()).list_for(user.id).await?;
    Ok(Json(tickets))
}

/// GET /api/support/tickets/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<TicketId>,
) -> Result<Json<TicketDetail>> {
    let ticket = visible_ticket(&state, id, &user).await?;
    let messages = SupportRepository::new(state.pool()).messages(id).await?;
    Ok(Json(TicketDetail { ticket, messages }))
}

/// Reply on a ticket.
///
/// A buyer reply reopens a resolved ticket. Staff replies leave the status
/// alone. Closed tickets take no more messages.
///
/// POST /api/support/tickets/{id}/messages
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add_message(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<TicketId>,
    ApiJson(body): ApiJson<MessageBody>,
) -> Result<impl IntoResponse> {
    let text = support::validate_message(&body.body)?;
    let ticket = visible_ticket(&state, id, &user).await?;

    let from_staff = user.is_admin && ticket.profile_id != user.id;
    let status = if from_staff {
        if ticket.status == TicketStatus::Closed {
            return Err(TicketError::Closed.into());
        }
        ticket.status
    } else {
        support::after_buyer_message(ticket.status)?
    };

    ensure_profile(&state, &user).await?;
    let message = SupportRepository::new(state.pool())
        .add_message(id, user.id, from_staff, &text, status)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /api/admin/support/tickets/{id}/status
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<TicketId>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Ticket>> {
    let repo = SupportRepository::new(state.pool());
    let ticket = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    let to = support::transition(ticket.status, body.status)?;
    let updated = repo.set_status(id, ticket.status, to).await?;

    tracing::info!(ticket_id = %id, from = %ticket.status, %to, "Ticket status changed");
    Ok(Json(updated))
}
