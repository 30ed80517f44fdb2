//! Admin image curation.
//!
//! Curators cycle each image through pending → approved → rejected, pick one
//! approved image as primary and then mark the product complete, which
//! deletes everything that was not approved from storage and the database.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::instrument;

use cyclemart_core::images::{self, ImageRecord, ResolvedImage};
use cyclemart_core::{DiscoveryJobId, ImageId, ProductId};

use super::extract::ApiPath;
use crate::db::{DiscoveryJobRepository, ImageRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::{CurationQueueItem, DiscoveryJob};
use crate::services::discovery::spawn_discovery;
use crate::state::AppState;

/// Image rows of a product, materializing the legacy document on first use.
async fn curated_rows(state: &AppState, product_id: ProductId) -> Result<Vec<ImageRecord>> {
    let images = ImageRepository::new(state.pool());
    let rows = images.list_for_product(product_id).await?;
    if !rows.is_empty() {
        return Ok(rows);
    }

    let (_, legacy) = ProductRepository::new(state.pool())
        .get_with_legacy_images(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let resolved = images::reconcile(&[], &legacy);
    if resolved.is_empty() {
        return Ok(Vec::new());
    }

    tracing::info!(%product_id, count = resolved.len(), "Importing legacy images");
    Ok(images.import_legacy(product_id, &resolved).await?)
}

/// The image rows of the product an image belongs to.
async fn rows_for_image(state: &AppState, image_id: ImageId) -> Result<(ProductId, Vec<ImageRecord>)> {
    let product_id = ImageRepository::new(state.pool())
        .product_of(image_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;
    let rows = ImageRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok((product_id, rows))
}

/// GET /api/admin/curation
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn queue(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<CurationQueueItem>>> {
    let items = ProductRepository::new(state.pool()).curation_queue().await?;
    Ok(Json(items))
}

/// GET /api/admin/products/{id}/images
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn product_images(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Vec<ResolvedImage>>> {
    let rows = curated_rows(&state, product_id).await?;
    if rows.is_empty() {
        // Either no images at all or a product that does not exist.
        ProductRepository::new(state.pool())
            .get(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    }
    Ok(Json(images::reconcile(&rows, &serde_json::Value::Null)))
}

/// Advance an image to its next status.
///
/// POST /api/admin/images/{id}/cycle
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn cycle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(image_id): ApiPath<ImageId>,
) -> Result<Json<ImageRecord>> {
    let (_, rows) = rows_for_image(&state, image_id).await?;
    let mut image = rows
        .into_iter()
        .find(|img| img.id == image_id)
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    let from = image.status;
    image.cycle();
    ImageRepository::new(state.pool()).save(&image).await?;

    tracing::debug!(%image_id, %from, to = %image.status, "Image cycled");
    Ok(Json(image))
}

/// Make an approved image the product's primary image.
///
/// POST /api/admin/images/{id}/primary
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn primary(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(image_id): ApiPath<ImageId>,
) -> Result<Json<Vec<ImageRecord>>> {
    let (product_id, mut rows) = rows_for_image(&state, image_id).await?;
    images::set_primary(&mut rows, image_id)?;

    ImageRepository::new(state.pool())
        .set_primary(product_id, image_id)
        .await?;
    Ok(Json(rows))
}

/// Finish curation of a product.
///
/// Storage objects are removed first; if that fails nothing in the database
/// changes and the curator can retry.
///
/// POST /api/admin/products/{id}/images/complete
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn complete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Vec<ImageRecord>>> {
    let rows = curated_rows(&state, product_id).await?;
    let plan = images::plan_completion(&rows)?;

    let paths = plan.storage_paths();
    if !paths.is_empty() {
        state.storage().delete(&paths).await?;
    }

    ImageRepository::new(state.pool())
        .complete(product_id, &plan)
        .await?;

    let product = product_id.to_string();
    let deleted = plan.delete.len().to_string();
    add_breadcrumb(
        "curation",
        "Curation completed",
        Some(&[("product_id", &product), ("deleted", &deleted)]),
    );
    tracing::info!(
        %product_id,
        kept = plan.keep.len(),
        deleted = plan.delete.len(),
        "Image curation completed"
    );

    Ok(Json(plan.keep))
}

/// Queue a scan of the product's storage folder.
///
/// POST /api/admin/products/{id}/images/discover
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn discover(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<impl IntoResponse> {
    ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let job = DiscoveryJobRepository::new(state.pool())
        .enqueue(product_id)
        .await?;
    spawn_discovery(
        state.pool().clone(),
        state.storage().clone(),
        job.id,
        product_id,
    );

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /api/admin/discovery-jobs/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn discovery_job(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(job_id): ApiPath<DiscoveryJobId>,
) -> Result<Json<DiscoveryJob>> {
    let job = DiscoveryJobRepository::new(state.pool())
        .get(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Discovery job not found".to_string()))?;
    Ok(Json(job))
}
