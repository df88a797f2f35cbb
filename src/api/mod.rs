//! API layer - HTTP handlers and routing
//!
//! - JSON API under `/api/v1` (articles, categories, tags, media, comments,
//!   settings, SEO tools, admin)
//! - Crawler documents (`/sitemap.xml`, `/robots.txt`, `/feed.xml`)
//! - Uploaded files under `/uploads`
//! - Server-rendered HTML pages

pub mod admin;
pub mod articles;
pub mod categories;
pub mod comments;
pub mod common;
pub mod feeds;
pub mod media;
pub mod middleware;
pub mod pages;
pub mod responses;
pub mod seo;
pub mod settings;
pub mod static_files;
pub mod tags;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, RequestStats};

/// Multipart framing allowance on top of the configured file size
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Build the JSON API router mounted at `/api/v1`
pub fn build_api_router(max_upload_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .nest("/articles", articles::router())
        .nest("/categories", categories::router())
        .nest("/tags", tags::router())
        .nest(
            "/media",
            media::router().layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest("/comments", comments::router())
        .nest("/settings", settings::router())
        .nest("/admin", admin::router())
        .merge(seo::router())
        .route("/health", get(admin::health))
        .fallback(api_not_found)
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("No such API endpoint")
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if cors_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(
                "Invalid CORS origin {:?}, cross-origin requests are disabled",
                cors_origin
            );
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let max_upload_size = state.config.upload.max_file_size;

    Router::new()
        .nest("/api/v1", build_api_router(max_upload_size))
        .route("/sitemap.xml", get(feeds::sitemap))
        .route("/robots.txt", get(feeds::robots))
        .route("/feed.xml", get(feeds::feed))
        .route("/uploads/{*path}", get(static_files::serve_upload))
        .merge(pages::router())
        .fallback(pages::not_found)
        .layer(cors_layer(cors_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

/// Router backed by an in-memory database and a scratch directory
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use axum_test::TestServer;
    use tempfile::TempDir;

    /// Uploads go to `<dir>/uploads` with a 4 KiB limit; template overrides
    /// are read from `<dir>/templates`, which does not exist initially.
    pub async fn test_server() -> (TestServer, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let mut config = Config::default();
        config.upload.path = dir.path().join("uploads");
        config.upload.max_file_size = 4096;
        config.theme.path = dir.path().join("templates");

        let state = AppState::new(pool, config).unwrap();
        let server = TestServer::new(build_router(state, "*")).unwrap();
        (server, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_server;
    use axum::http::{header, HeaderValue, StatusCode};
    use serde_json::Value;

    #[tokio::test]
    async fn test_unknown_api_path_is_json_404() {
        let (server, _dir) = test_server().await;
        let response = server.get("/api/v1/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let (server, _dir) = test_server().await;
        let response = server
            .get("/api/v1/health")
            .add_header(
                header::ORIGIN,
                HeaderValue::from_static("https://elsewhere.example"),
            )
            .await;
        response.assert_status_ok();
        assert_eq!(response.header("access-control-allow-origin"), "*");
    }
}
