//! Seller storefront routes: profile, delivery, store categories and services.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use cyclemart_core::delivery::{self, DeliveryQuote, DeliverySettings};
use cyclemart_core::{ServiceId, StoreCategoryId, StoreId};

use super::ensure_profile;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::StoreRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, RequireAuth};
use crate::models::{
    NewService, NewStore, NewStoreCategory, Store, StoreCategory, StoreProfile, StoreService,
    StoreUpdate,
};
use crate::state::AppState;

/// Query for `GET /api/stores/{id}/delivery-quote`.
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub subtotal: Decimal,
    pub distance_km: Decimal,
}

/// Load a store and check that `user` owns it (admins pass too).
async fn owned_store(state: &AppState, id: StoreId, user: &AuthUser) -> Result<Store> {
    let store = StoreRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Store not found".to_string()))?;

    if store.owner_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden("You do not own this store".to_string()));
    }
    Ok(store)
}

async fn existing_store(state: &AppState, id: StoreId) -> Result<Store> {
    StoreRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Store not found".to_string()))
}

/// Open a store for the caller.
///
/// POST /api/stores
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<NewStore>,
) -> Result<impl IntoResponse> {
    let store = body.validate().map_err(AppError::BadRequest)?;
    ensure_profile(&state, &user).await?;

    let created = StoreRepository::new(state.pool())
        .create(user.id, &store)
        .await?;

    tracing::info!(store_id = %created.id, slug = %created.slug, "Store created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Public store page.
///
/// GET /api/stores/{slug}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<StoreProfile>> {
    let stores = StoreRepository::new(state.pool());
    let store = stores
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Store not found".to_string()))?;

    let (categories, services, active_listings) = tokio::try_join!(
        stores.list_categories(store.id),
        stores.list_services(store.id),
        stores.active_listing_count(store.id),
    )?;

    Ok(Json(StoreProfile {
        store,
        categories,
        services,
        active_listings,
    }))
}

/// Update the store profile.
///
/// PUT /api/stores/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
    ApiJson(body): ApiJson<StoreUpdate>,
) -> Result<Json<Store>> {
    let mut store = owned_store(&state, id, &user).await?;
    body.apply_to(&mut store).map_err(AppError::BadRequest)?;

    let updated = StoreRepository::new(state.pool())
        .update_profile(&store)
        .await?;
    Ok(Json(updated))
}

/// Replace the delivery settings sheet.
///
/// PUT /api/stores/{id}/delivery
#[instrument(skip(state, user, settings), fields(user_id = %user.id))]
pub async fn update_delivery(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
    ApiJson(settings): ApiJson<DeliverySettings>,
) -> Result<Json<Store>> {
    settings.validate()?;
    owned_store(&state, id, &user).await?;

    let updated = StoreRepository::new(state.pool())
        .update_delivery(id, &settings)
        .await?;
    Ok(Json(updated))
}

/// Quote delivery from a store.
///
/// GET /api/stores/{id}/delivery-quote
#[instrument(skip(state))]
pub async fn delivery_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<StoreId>,
    ApiQuery(query): ApiQuery<QuoteQuery>,
) -> Result<Json<DeliveryQuote>> {
    let store = existing_store(&state, id).await?;
    let quote = delivery::quote(&store.delivery, query.subtotal, query.distance_km)?;
    Ok(Json(quote))
}

// =============================================================================
// Store categories
// =============================================================================

/// GET /api/stores/{id}/categories
#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<StoreId>,
) -> Result<Json<Vec<StoreCategory>>> {
    existing_store(&state, id).await?;
    let categories = StoreRepository::new(state.pool())
        .list_categories(id)
        .await?;
    Ok(Json(categories))
}

/// POST /api/stores/{id}/categories
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
    ApiJson(body): ApiJson<NewStoreCategory>,
) -> Result<impl IntoResponse> {
    let category = body.validate().map_err(AppError::BadRequest)?;
    owned_store(&state, id, &user).await?;

    let created = StoreRepository::new(state.pool())
        .create_category(id, &category)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/stores/{id}/categories/{category_id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_category(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath((id, category_id)): ApiPath<(StoreId, StoreCategoryId)>,
    ApiJson(body): ApiJson<NewStoreCategory>,
) -> Result<Json<StoreCategory>> {
    let category = body.validate().map_err(AppError::BadRequest)?;
    owned_store(&state, id, &user).await?;

    let updated = StoreRepository::new(state.pool())
        .update_category(id, category_id, &category)
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/stores/{id}/categories/{category_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath((id, category_id)): ApiPath<(StoreId, StoreCategoryId)>,
) -> Result<StatusCode> {
    owned_store(&state, id, &user).await?;
    StoreRepository::new(state.pool())
        .delete_category(id, category_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Services
// =============================================================================

/// GET /api/stores/{id}/services
#[instrument(skip(state))]
pub async fn list_services(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<StoreId>,
) -> Result<Json<Vec<StoreService>>> {
    existing_store(&state, id).await?;
    let services = StoreRepository::new(state.pool()).list_services(id).await?;
    Ok(Json(services))
}

/// POST /api/stores/{id}/services
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_service(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<StoreId>,
    ApiJson(body): ApiJson<NewService>,
) -> Result<impl IntoResponse> {
    let service = body.validate().map_err(AppError::BadRequest)?;
    owned_store(&state, id, &user).await?;

    let created = StoreRepository::new(state.pool())
        .create_service(id, &service)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/stores/{id}/services/{service_id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_service(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath((id, service_id)): ApiPath<(StoreId, ServiceId)>,
    ApiJson(body): ApiJson<NewService>,
) -> Result<Json<StoreService>> {
    let service = body.validate().map_err(AppError::BadRequest)?;
    owned_store(&state, id, &user).await?;

    let updated = StoreRepository::new(state.pool())
        .update_service(id, service_id, &service)
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/stores/{id}/services/{service_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_service(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath((id, service_id)): ApiPath<(StoreId, ServiceId)>,
) -> Result<StatusCode> {
    owned_store(&state, id, &user).await?;
    StoreRepository::new(state.pool())
        .delete_service(id, service_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
