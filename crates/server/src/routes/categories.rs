//! Marketplace taxonomy routes.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::instrument;

use cyclemart_core::CategoryId;

use super::extract::{ApiJson, ApiPath};
use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::category::{build_tree, child_level};
use crate::models::{Category, CategoryUpdate, NewCategory};
use crate::state::AppState;

/// The category tree.
///
/// GET /api/categories
#[instrument(skip(state))]
pub async fn tree(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = CategoryRepository::new(state.pool()).list_all().await?;
    Ok((
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json(build_tree(categories)),
    ))
}

/// POST /api/admin/categories
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<NewCategory>,
) -> Result<impl IntoResponse> {
    let category = body.validate().map_err(AppError::BadRequest)?;
    let repo = CategoryRepository::new(state.pool());

    let parent_level = match category.parent_id {
        Some(parent_id) => Some(
            repo.get(parent_id)
                .await?
                .ok_or_else(|| AppError::BadRequest("Parent category not found".to_string()))?
                .level,
        ),
        None => None,
    };
    let level = child_level(parent_level).map_err(AppError::BadRequest)?;

    let created = repo
        .create(
            category.parent_id,
            &category.name,
            &category.slug,
            level,
            category.position,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/categories/{id}
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(body): ApiJson<CategoryUpdate>,
) -> Result<Json<Category>> {
    let repo = CategoryRepository::new(state.pool());
    let mut category = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    body.apply_to(&mut category).map_err(AppError::BadRequest)?;
    Ok(Json(repo.update(&category).await?))
}

/// DELETE /api/admin/categories/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
