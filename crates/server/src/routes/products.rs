//! Listing routes.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use cyclemart_core::images::reconcile;
use cyclemart_core::{ProductId, ProductStatus};

use super::ensure_profile;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::config::MAX_SIMILAR_LIMIT;
use crate::db::{CategoryRepository, ImageRepository, ProductRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, OptionalAuth, RequireAuth};
use crate::models::{NewProduct, Page, Product, ProductDetail, ProductFilter, ProductUpdate};
use crate::state::AppState;

/// Query for `GET /api/products/{id}/similar`.
#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
}

/// Load a listing and check that `user` owns its store (admins pass too).
async fn owned_product(state: &AppState, id: ProductId, user: &AuthUser) -> Result<Product> {
    let products = ProductRepository::new(state.pool());
    let product = products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if !user.is_admin && products.owner(id).await? != Some(user.id) {
        return Err(AppError::Forbidden(
            "You do not own this listing".to_string(),
        ));
    }
    Ok(product)
}

/// Search active listings.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<impl IntoResponse> {
    let (page, per_page) = filter.pagination().map_err(AppError::BadRequest)?;

    let (items, total) = ProductRepository::new(state.pool())
        .search(&filter, page, per_page)
        .await?;

    Ok((
        [(header::CACHE_CONTROL, "public, max-age=30")],
        Json(Page {
            items,
            page,
            per_page,
            total,
        }),
    ))
}

/// Listing detail with reconciled images.
///
/// Drafts and archived listings are only visible to their owner and admins.
///
/// GET /api/products/{id}
#[instrument(skip(state, auth))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductDetail>> {
    let products = ProductRepository::new(state.pool());
    let (product, legacy) = products
        .get_with_legacy_images(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if matches!(product.status, ProductStatus::Draft | ProductStatus::Archived) {
        let visible = match &auth {
            Some(user) if user.is_admin => true,
            Some(user) => products.owner(id).await? == Some(user.id),
            None => false,
        };
        if !visible {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
    }

    let rows = ImageRepository::new(state.pool())
        .list_for_product(id)
        .await?;

    Ok(Json(ProductDetail {
        images: reconcile(&rows, &legacy),
        product,
    }))
}

/// Create a listing in the caller's store.
///
/// POST /api/products
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<impl IntoResponse> {
    let product = body.validate().map_err(AppError::BadRequest)?;
    ensure_profile(&state, &user).await?;

    let stores = StoreRepository::new(state.pool());
    let store = stores.get_by_owner(user.id).await?.ok_or_else(|| {
        AppError::Forbidden("Create a store before listing products".to_string())
    })?;

    if CategoryRepository::new(state.pool())
        .get(product.category_id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("Unknown category".to_string()));
    }

    if let Some(store_category) = product.store_category_id {
        let categories = stores.list_categories(store.id).await?;
        if !categories.iter().any(|c| c.id == store_category) {
            return Err(AppError::BadRequest("Unknown store category".to_string()));
        }
    }

    let created = ProductRepository::new(state.pool())
        .create(store.id, &product)
        .await?;

    tracing::info!(product_id = %created.id, "Listing created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a listing.
///
/// PUT /api/products/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductUpdate>,
) -> Result<Json<Product>> {
    let changes = body.validate().map_err(AppError::BadRequest)?;
    let mut product = owned_product(&state, id, &user).await?;

    if matches!(product.status, ProductStatus::Sold | ProductStatus::Archived) {
        return Err(AppError::Conflict(
            "Sold or archived listings cannot be edited".to_string(),
        ));
    }

    changes.apply_to(&mut product);
    let updated = ProductRepository::new(state.pool()).update(&product).await?;
    Ok(Json(updated))
}

/// Archive a listing.
///
/// DELETE /api/products/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn archive(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    let product = owned_product(&state, id, &user).await?;

    match product.status {
        ProductStatus::Sold => Err(AppError::Conflict(
            "Sold listings cannot be archived".to_string(),
        )),
        ProductStatus::Archived => Ok(StatusCode::NO_CONTENT),
        ProductStatus::Draft | ProductStatus::Active => {
            ProductRepository::new(state.pool())
                .set_status(id, ProductStatus::Archived)
                .await?;
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

/// Listings similar to this one.
///
/// GET /api/products/{id}/similar
#[instrument(skip(state))]
pub async fn similar(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiQuery(query): ApiQuery<SimilarQuery>,
) -> Result<impl IntoResponse> {
    let limit = query
        .limit
        .unwrap_or(state.config().marketplace.similar_products_limit);
    if !(1..=MAX_SIMILAR_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_SIMILAR_LIMIT}"
        )));
    }

    let source = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let ranked = state.similar().find(state.pool(), &source, limit).await?;

    Ok((
        [(header::CACHE_CONTROL, "public, max-age=60")],
        Json(ranked.as_ref().clone()),
    ))
}
