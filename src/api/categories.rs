//! Category API endpoints
//!
//! - GET    /api/v1/categories             - List categories (`?tree=true` for a nested forest)
//! - POST   /api/v1/categories             - Create category
//! - GET    /api/v1/categories/{id}        - Get category by ID
//! - PUT    /api/v1/categories/{id}        - Update category
//! - DELETE /api/v1/categories/{id}        - Delete category (articles are detached)
//! - GET    /api/v1/categories/slug/{slug} - Get category by slug

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState};
use crate::models::{Category, CategoryTree};
use crate::services::{CategoryInput, CategoryPatch};

#[derive(Debug, Deserialize)]
pub struct ListCategoriesQuery {
    #[serde(default)]
    pub tree: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CategoryListResponse {
    Flat(Vec<Category>),
    Tree(Vec<CategoryTree>),
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/slug/{slug}", get(get_category_by_slug))
}

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListCategoriesQuery>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let response = if query.tree {
        CategoryListResponse::Tree(state.category_service.tree().await?)
    } else {
        CategoryListResponse::Flat(state.category_service.list().await?)
    };
    Ok(Json(response))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, ApiError> {
    state
        .category_service
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Category not found: {}", id)))
}

/// GET /api/v1/categories/slug/{slug}
async fn get_category_by_slug(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Category>, ApiError> {
    state
        .category_service
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Category not found: {}", slug)))
}

/// PUT /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<CategoryPatch>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, patch).await?))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
