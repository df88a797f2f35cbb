//! API middleware and shared handler types
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - Request statistics collected by a lightweight middleware
//! - `ApiError`, the JSON error envelope, and its mapping from service errors
//! - Cache-Control helpers for public responses

use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        multipart::MultipartRejection,
        FromRequest, FromRequestParts, Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::cache::{create_cache, Cache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxMediaRepository,
    SqlxSettingsRepository, SqlxTagRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    ArticleService, ArticleServiceError, CategoryService, CategoryServiceError, CommentService,
    CommentServiceError, MarkdownRenderer, MediaService, MediaServiceError, SettingsService,
    SettingsServiceError, SitemapService, TagService, TagServiceError,
};
use crate::theme::ThemeEngine;

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    /// Total number of requests processed
    total_requests: AtomicU64,
    /// Responses with a 4xx status
    client_errors: AtomicU64,
    /// Responses with a 5xx status
    server_errors: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    /// Application start time
    start_time: Instant,
}

/// Point-in-time copy of [`RequestStats`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStatsSnapshot {
    pub total_requests: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub avg_response_time_us: f64,
    pub uptime_seconds: u64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished request
    pub fn record(&self, status: StatusCode, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
        if status.is_server_error() {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_client_error() {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> RequestStatsSnapshot {
        RequestStatsSnapshot {
            total_requests: self.total_requests(),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            avg_response_time_us: self.avg_response_time_us(),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Request stats middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let duration_us = start.elapsed().as_micros() as u64;
    state.request_stats.record(response.status(), duration_us);
    response
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<Cache>,
    pub article_service: Arc<ArticleService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub comment_service: Arc<CommentService>,
    pub media_service: Arc<MediaService>,
    pub settings_service: Arc<SettingsService>,
    pub sitemap_service: Arc<SitemapService>,
    pub theme_engine: Arc<RwLock<ThemeEngine>>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories and services on top of a migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> Result<Self> {
        let cache = create_cache(&config.cache);

        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let settings_repo = SqlxSettingsRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let media_repo = SqlxMediaRepository::boxed(pool);

        let settings_service = Arc::new(SettingsService::new(settings_repo, cache.clone()));
        let tag_service = Arc::new(TagService::new(tag_repo.clone(), cache.clone()));
        let category_service = Arc::new(CategoryService::new(
            category_repo.clone(),
            cache.clone(),
        ));
        let article_service = Arc::new(ArticleService::new(
            article_repo.clone(),
            category_repo.clone(),
            tag_service.clone(),
            cache.clone(),
            MarkdownRenderer::new(),
        ));
        let comment_service = Arc::new(CommentService::new(
            comment_repo,
            article_repo.clone(),
            settings_service.clone(),
        ));
        let media_service = Arc::new(MediaService::new(media_repo, config.upload.clone()));
        let sitemap_service = Arc::new(SitemapService::new(
            article_repo,
            category_repo,
            tag_repo,
            settings_service.clone(),
            cache.clone(),
            config.public_base_url(),
        ));

        let theme_engine = ThemeEngine::new(&config.theme.path)?;

        Ok(Self {
            config: Arc::new(config),
            cache,
            article_service,
            category_service,
            tag_service,
            comment_service,
            media_service,
            settings_service,
            sitemap_service,
            theme_engine: Arc::new(RwLock::new(theme_engine)),
            request_stats: Arc::new(RequestStats::new()),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn conflict(message: impl Into<String>, field: &str, value: &str) -> Self {
        Self::with_details(
            "CONFLICT",
            message,
            serde_json::json!({ "field": field, "value": value }),
        )
    }

    /// Log the cause and return a generic 500 that leaks nothing
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "UNSUPPORTED_MEDIA_TYPE" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(msg) => Self::not_found(msg),
            ArticleServiceError::ValidationError(msg) => Self::validation_error(msg),
            ArticleServiceError::DuplicateSlug(slug) => Self::conflict(
                format!("Article slug already exists: {}", slug),
                "slug",
                &slug,
            ),
            ArticleServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound(msg) => Self::not_found(msg),
            CategoryServiceError::ValidationError(msg) => Self::validation_error(msg),
            CategoryServiceError::DuplicateSlug(slug) => Self::conflict(
                format!("Category slug already exists: {}", slug),
                "slug",
                &slug,
            ),
            CategoryServiceError::ParentNotFound(id) => Self::with_details(
                "VALIDATION_ERROR",
                format!("Parent category not found: {}", id),
                serde_json::json!({ "field": "parent_id", "value": id }),
            ),
            CategoryServiceError::CircularReference => Self::with_details(
                "VALIDATION_ERROR",
                "A category cannot be its own ancestor",
                serde_json::json!({ "field": "parent_id" }),
            ),
            CategoryServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(msg) => Self::not_found(msg),
            TagServiceError::ValidationError(msg) => Self::validation_error(msg),
            TagServiceError::DuplicateSlug(slug) => {
                Self::conflict(format!("Tag already exists: {}", slug), "slug", &slug)
            }
            TagServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(msg) => Self::not_found(msg),
            CommentServiceError::ValidationError(msg) => Self::validation_error(msg),
            CommentServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<MediaServiceError> for ApiError {
    fn from(err: MediaServiceError) -> Self {
        match err {
            MediaServiceError::NotFound(msg) => Self::not_found(msg),
            MediaServiceError::ValidationError(msg) => Self::validation_error(msg),
            MediaServiceError::UnsupportedType(mime) => Self::with_details(
                "UNSUPPORTED_MEDIA_TYPE",
                format!("Unsupported file type: {}", mime),
                serde_json::json!({ "mime_type": mime }),
            ),
            MediaServiceError::TooLarge { size, max } => Self::with_details(
                "PAYLOAD_TOO_LARGE",
                format!("File too large: {} bytes (max {} bytes)", size, max),
                serde_json::json!({ "size": size, "max": max }),
            ),
            MediaServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(err: SettingsServiceError) -> Self {
        match err {
            SettingsServiceError::ValidationError(msg) => Self::validation_error(msg),
            SettingsServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_error(err)
    }
}

/// Map an extractor rejection onto the error envelope by its status
fn rejection_error(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::UNPROCESSABLE_ENTITY => ApiError::validation_error(message),
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::new("PAYLOAD_TOO_LARGE", message),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::new("UNSUPPORTED_MEDIA_TYPE", message),
        s if s.is_server_error() => ApiError::internal_error(message),
        _ => ApiError::bad_request(message),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose rejections use the error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections use the error envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string whose rejections use the error envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ============================================================================
// HTTP Cache Headers
// ============================================================================

/// Build Cache-Control header for static assets
pub fn cache_control_static(max_age: u32, immutable: bool) -> String {
    if immutable {
        format!("public, max-age={}, immutable", max_age)
    } else {
        format!("public, max-age={}", max_age)
    }
}

/// Build Cache-Control header for generated public documents
pub fn cache_control_public(max_age: u32) -> String {
    format!("public, max-age={}", max_age)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::conflict("x", "slug", "a").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::new("PAYLOAD_TOO_LARGE", "x").status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::new("UNSUPPORTED_MEDIA_TYPE", "x").status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::new("SOMETHING_ELSE", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err: ApiError = anyhow::anyhow!("connection refused at 10.0.0.3").into();
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert!(!err.error.message.contains("10.0.0.3"));
    }

    #[test]
    fn test_service_error_conversions() {
        let err: ApiError = ArticleServiceError::DuplicateSlug("hello".to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.error.details.unwrap()["value"], "hello");

        let err: ApiError = MediaServiceError::TooLarge { size: 20, max: 10 }.into();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let err: ApiError = MediaServiceError::UnsupportedType("text/x-shellscript".into()).into();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err: ApiError = CategoryServiceError::CircularReference.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = CommentServiceError::NotFound("Comment 3".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_body_shape() {
        let json = serde_json::to_value(ApiError::not_found("Article not found: 9")).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Article not found: 9");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_request_stats() {
        let stats = RequestStats::new();
        assert_eq!(stats.avg_response_time_us(), 0.0);

        stats.record(StatusCode::OK, 100);
        stats.record(StatusCode::NOT_FOUND, 200);
        stats.record(StatusCode::INTERNAL_SERVER_ERROR, 300);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.client_errors, 1);
        assert_eq!(snapshot.server_errors, 1);
        assert_eq!(snapshot.avg_response_time_us, 200.0);
    }

    #[test]
    fn test_cache_control_headers() {
        assert_eq!(
            cache_control_static(31536000, true),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(cache_control_static(60, false), "public, max-age=60");
        assert_eq!(cache_control_public(3600), "public, max-age=3600");
    }
}
