//! Read-only tag and ingredient endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::validate_catalog_id;
use super::{ApiError, ApiResponse, AppState, IngredientDto, TagDto};
use crate::services::CatalogError;

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearchQuery {
    pub name: Option<String>,
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::TagNotFound(id) => Self::not_found("Tag", id),
            CatalogError::IngredientNotFound(id) => Self::not_found("Ingredient", id),
            CatalogError::Validation(msg) => Self::validation(msg),
            CatalogError::Database(msg) => Self::DatabaseError(msg),
            CatalogError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// `GET /api/tags`
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<TagDto>>>, ApiError> {
    let tags = state.catalog_service().list_tags().await?;
    Ok(Json(ApiResponse::success(tags)))
}

/// `GET /api/tags/{id}`
pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<TagDto>>, ApiError> {
    let id = validate_catalog_id("tag", id)?;
    let tag = state.catalog_service().get_tag(id).await?;
    Ok(Json(ApiResponse::success(tag)))
}

/// Lists ingredients, optionally narrowed by name prefix.
///
/// # Endpoint
/// `GET /api/ingredients?name=<prefix>`
pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IngredientSearchQuery>,
) -> Result<Json<ApiResponse<Vec<IngredientDto>>>, ApiError> {
    let prefix = query.name.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let ingredients = state.catalog_service().search_ingredients(prefix).await?;
    Ok(Json(ApiResponse::success(ingredients)))
}

/// `GET /api/ingredients/{id}`
pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<IngredientDto>>, ApiError> {
    let id = validate_catalog_id("ingredient", id)?;
    let ingredient = state.catalog_service().get_ingredient(id).await?;
    Ok(Json(ApiResponse::success(ingredient)))
}
