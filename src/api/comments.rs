//! Comment API endpoints
//!
//! Public:
//! - GET  /api/v1/articles/{id}/comments - Approved comments as a reply tree
//! - POST /api/v1/articles/{id}/comments - Submit a comment
//!
//! Moderation:
//! - GET    /api/v1/comments             - All comments (page, per_page, status)
//! - PUT    /api/v1/comments/{id}/status - Approve, hold or mark as spam
//! - DELETE /api/v1/comments/{id}        - Delete a comment and its replies

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, parse_filter, PageResponse};
use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState};
use crate::models::{Comment, CommentStatus, CommentTree, ListParams};
use crate::services::CommentInput;

#[derive(Debug, Deserialize)]
pub struct ListCommentsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CommentStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments))
        .route("/{id}/status", put(update_comment_status))
        .route("/{id}", delete(delete_comment))
}

/// GET /api/v1/articles/{id}/comments
pub async fn list_article_comments(
    State(state): State<AppState>,
    ApiPath(article_id): ApiPath<i64>,
) -> Result<Json<Vec<CommentTree>>, ApiError> {
    state
        .article_service
        .get_by_id(article_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article not found: {}", article_id)))?;

    Ok(Json(
        state.comment_service.list_for_article(article_id).await?,
    ))
}

/// POST /api/v1/articles/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    ApiPath(article_id): ApiPath<i64>,
    ApiJson(input): ApiJson<CommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.comment_service.create(article_id, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/comments
pub async fn list_comments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListCommentsQuery>,
) -> Result<Json<PageResponse<Comment>>, ApiError> {
    let status = parse_filter::<CommentStatus>("status", query.status.as_deref())?;
    let params = ListParams::new(query.page, query.per_page);
    let result = state.comment_service.list(status, &params).await?;
    Ok(Json(result.into()))
}

/// PUT /api/v1/comments/{id}/status
pub async fn update_comment_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.set_status(id, body.status).await?))
}

/// DELETE /api/v1/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
