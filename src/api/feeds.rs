//! Crawler-facing documents
//!
//! - GET /sitemap.xml
//! - GET /robots.txt
//! - GET /feed.xml

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::middleware::{cache_control_public, ApiError, AppState};

const FEED_MAX_AGE: u32 = 3600;

fn document(content_type: &'static str, body: String) -> Response {
    let cache_control = cache_control_public(FEED_MAX_AGE);
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache_control.as_str()),
        ],
        body,
    )
        .into_response()
}

/// GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>) -> Result<Response, ApiError> {
    let xml = state.sitemap_service.sitemap_xml().await?;
    Ok(document("application/xml; charset=utf-8", xml))
}

/// GET /robots.txt
pub async fn robots(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.sitemap_service.robots_txt().await?;
    Ok(document("text/plain; charset=utf-8", body))
}

/// GET /feed.xml
pub async fn feed(State(state): State<AppState>) -> Result<Response, ApiError> {
    let xml = state.sitemap_service.rss_feed().await?;
    Ok(document("application/rss+xml; charset=utf-8", xml))
}
