//! Offer / counter-offer negotiation routes.
//!
//! Only the buyer and the seller of an offer can see or act on it. Everyone
//! else gets a 404 so offer IDs do not leak.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::instrument;

use cyclemart_core::offers::{Negotiation, OfferAction, OfferError};
use cyclemart_core::{OfferId, Party, ProductStatus};

use super::ensure_profile;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::{OfferRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{AuthUser, RequireAuth};
use crate::models::offer::offer_ttl;
use crate::models::{CounterOffer, NewOffer, Offer, OfferDetail, OfferListQuery, optional_text};
use crate::state::AppState;

const MESSAGE_MAX: usize = 1000;

fn not_found() -> AppError {
    AppError::NotFound("Offer not found".to_string())
}

/// Load an offer the caller takes part in, with the caller's side.
async fn participant_offer(state: &AppState, id: OfferId, user: &AuthUser) -> Result<(Offer, Party)> {
    let offer = OfferRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(not_found)?;
    let party = offer.party_of(user.id).ok_or_else(not_found)?;
    Ok((offer, party))
}

/// Make an offer on a listing.
///
/// POST /api/offers
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<NewOffer>,
) -> Result<impl IntoResponse> {
    let message = optional_text(body.message);
    if message.as_ref().is_some_and(|m| m.chars().count() > MESSAGE_MAX) {
        return Err(AppError::BadRequest(format!(
            "message must be at most {MESSAGE_MAX} characters"
        )));
    }

    let products = ProductRepository::new(state.pool());
    let product = products
        .get(body.product_id)
        .await?
        .filter(|p| p.status == ProductStatus::Active)
        .ok_or_else(|| AppError::NotFound("Product is not available".to_string()))?;
    let seller = products
        .owner(product.id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("product {} has no owner", product.id)))?;
    if seller == user.id {
        return Err(AppError::BadRequest(
            "You cannot make an offer on your own listing".to_string(),
        ));
    }

    let ttl = offer_ttl(state.config().marketplace.offer_ttl_hours);
    let negotiation = Negotiation::open(body.amount, product.price, Utc::now(), ttl)?;

    ensure_profile(&state, &user).await?;
    let offer = OfferRepository::new(state.pool())
        .create(product.id, user.id, seller, &negotiation, message.as_deref())
        .await?;

    tracing::info!(offer_id = %offer.id, amount = %offer.amount, "Offer opened");
    Ok((StatusCode::CREATED, Json(offer)))
}

/// The caller's offers as buyer or seller.
///
/// GET /api/offers?role=buyer|seller
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<OfferListQuery>,
) -> Result<Json<Vec<Offer>>> {
    let now = Utc::now();
    let offers = OfferRepository::new(state.pool())
        .list_for(user.id, query.role)
        .await?
        .into_iter()
        .map(|offer| offer.observed_at(now))
        .collect();
    Ok(Json(offers))
}

/// GET /api/offers/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OfferId>,
) -> Result<Json<OfferDetail>> {
    let (offer, _) = participant_offer(&state, id, &user).await?;
    let events = OfferRepository::new(state.pool()).events(id).await?;

    Ok(Json(OfferDetail {
        offer: offer.observed_at(Utc::now()),
        events,
    }))
}

async fn act(state: &AppState, user: &AuthUser, id: OfferId, action: OfferAction) -> Result<Json<Offer>> {
    let (offer, party) = participant_offer(state, id, user).await?;

    let ttl = offer_ttl(state.config().marketplace.offer_ttl_hours);
    let next = match offer.negotiation().apply(party, &action, Utc::now(), ttl) {
        Ok(next) => next,
        Err(OfferError::Expired) => {
            if OfferRepository::new(state.pool()).expire(id).await? {
                tracing::info!(offer_id = %id, "Offer expired");
            }
            return Err(OfferError::Expired.into());
        }
        Err(e) => return Err(e.into()),
    };
    let amount = match &action {
        OfferAction::Counter(amount) => Some(*amount),
        _ => None,
    };

    let updated = OfferRepository::new(state.pool())
        .apply(&offer, &next, party, action.name(), amount)
        .await?;

    let offer_id = id.to_string();
    add_breadcrumb(
        "offers",
        &format!("Offer {}", action.name()),
        Some(&[("offer_id", &offer_id), ("status", &updated.status.to_string())]),
    );
    tracing::info!(offer_id = %id, action = action.name(), status = %updated.status, round = updated.round, "Offer updated");

    Ok(Json(updated))
}

/// POST /api/offers/{id}/accept
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn accept(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OfferId>,
) -> Result<Json<Offer>> {
    act(&state, &user, id, OfferAction::Accept).await
}

/// POST /api/offers/{id}/reject
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn reject(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OfferId>,
) -> Result<Json<Offer>> {
    act(&state, &user, id, OfferAction::Reject).await
}

/// POST /api/offers/{id}/withdraw
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn withdraw(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OfferId>,
) -> Result<Json<Offer>> {
    act(&state, &user, id, OfferAction::Withdraw).await
}

/// POST /api/offers/{id}/counter
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn counter(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OfferId>,
    ApiJson(body): ApiJson<CounterOffer>,
) -> Result<Json<Offer>> {
    act(&state, &user, id, OfferAction::Counter(body.amount)).await
}
