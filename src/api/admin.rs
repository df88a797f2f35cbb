//! Admin API endpoints
//!
//! - GET    /api/v1/admin/stats        - Content counts, cache and request statistics
//! - DELETE /api/v1/admin/cache        - Drop every cached entry
//! - POST   /api/v1/admin/theme/reload - Re-read template overrides from disk
//! - GET    /api/v1/health             - Liveness check

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, RequestStatsSnapshot};
use crate::cache::{CacheLayer, CacheStats};
use crate::models::ArticleStatus;

#[derive(Debug, Serialize)]
pub struct ArticleCounts {
    pub total: i64,
    pub draft: i64,
    pub published: i64,
    pub archived: i64,
}

#[derive(Debug, Serialize)]
pub struct MediaUsage {
    pub count: i64,
    pub total_size: i64,
}

/// Response for dashboard stats
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub articles: ArticleCounts,
    pub pending_comments: i64,
    pub media: MediaUsage,
    pub cache: CacheStats,
    pub requests: RequestStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/cache", delete(clear_cache))
        .route("/theme/reload", post(reload_theme))
}

/// GET /api/v1/admin/stats
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let articles = &state.article_service;
    let counts = ArticleCounts {
        total: articles.count(None).await?,
        draft: articles.count(Some(ArticleStatus::Draft)).await?,
        published: articles.count(Some(ArticleStatus::Published)).await?,
        archived: articles.count(Some(ArticleStatus::Archived)).await?,
    };
    let pending_comments = state.comment_service.count_pending().await?;
    let (count, total_size) = state.media_service.usage().await?;

    Ok(Json(StatsResponse {
        articles: counts,
        pending_comments,
        media: MediaUsage { count, total_size },
        cache: state.cache.stats(),
        requests: state.request_stats.snapshot(),
    }))
}

/// DELETE /api/v1/admin/cache
async fn clear_cache(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.cache.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/theme/reload
///
/// A broken override keeps the previous templates in place.
async fn reload_theme(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let mut engine = state
        .theme_engine
        .write()
        .map_err(|_| ApiError::internal_error("Theme engine lock poisoned"))?;
    engine
        .reload()
        .map_err(|e| ApiError::validation_error(format!("{:#}", e)))?;
    tracing::info!("Templates reloaded");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
