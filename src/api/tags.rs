//! Tag API endpoints
//!
//! - GET    /api/v1/tags             - List tags with article counts (`?published_only=true`)
//! - POST   /api/v1/tags             - Create tag
//! - GET    /api/v1/tags/{id}        - Get tag by ID
//! - PUT    /api/v1/tags/{id}        - Rename or re-slug a tag
//! - DELETE /api/v1/tags/{id}        - Delete tag
//! - GET    /api/v1/tags/slug/{slug} - Get tag by slug

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState};
use crate::models::{Tag, TagWithCount};

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    /// Count only published articles
    #[serde(default)]
    pub published_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/{id}", get(get_tag).put(update_tag).delete(delete_tag))
        .route("/slug/{slug}", get(get_tag_by_slug))
}

/// GET /api/v1/tags
async fn list_tags(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListTagsQuery>,
) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    Ok(Json(
        state
            .tag_service
            .list_with_counts(query.published_only)
            .await?,
    ))
}

/// POST /api/v1/tags
async fn create_tag(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state
        .tag_service
        .create(&body.name, body.slug.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /api/v1/tags/{id}
async fn get_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Tag>, ApiError> {
    state
        .tag_service
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Tag not found: {}", id)))
}

/// GET /api/v1/tags/slug/{slug}
async fn get_tag_by_slug(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Tag>, ApiError> {
    state
        .tag_service
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Tag not found: {}", slug)))
}

/// PUT /api/v1/tags/{id}
async fn update_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateTagRequest>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state
        .tag_service
        .update(id, body.name.as_deref(), body.slug.as_deref())
        .await?;
    Ok(Json(tag))
}

/// DELETE /api/v1/tags/{id}
async fn delete_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
