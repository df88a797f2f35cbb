//! Editor tooling endpoints
//!
//! - POST /api/v1/seo/analyze - Score a draft without saving it
//! - POST /api/v1/render      - Markdown preview

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiJson, AppState};
use crate::services::{analyze as analyze_seo, SeoInput, SeoReport, TocEntry};

/// Request for rendering markdown content
#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub content: String,
}

/// Response for rendered content
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/seo/analyze", post(analyze))
        .route("/render", post(render_content))
}

/// POST /api/v1/seo/analyze
async fn analyze(ApiJson(input): ApiJson<SeoInput>) -> Json<SeoReport> {
    Json(analyze_seo(&input))
}

/// POST /api/v1/render
async fn render_content(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RenderRequest>,
) -> Json<RenderResponse> {
    let (html, toc) = state.article_service.render_markdown(&body.content);
    Json(RenderResponse { html, toc })
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::test_server;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_analyze_draft() {
        let (server, _dir) = test_server().await;

        let empty: Value = server.post("/api/v1/seo/analyze").json(&json!({})).await.json();
        assert_eq!(empty["grade"], "poor");

        let report: Value = server
            .post("/api/v1/seo/analyze")
            .json(&json!({
                "title": "A practical guide to caching in Rust services",
                "slug": "caching-in-rust",
                "content": "## Why cache\n\nCaching in Rust is simple.\n\n## How\n\nUse moka.",
                "tags": ["rust", "caching"],
                "focus_keyword": "caching"
            }))
            .await
            .json();
        let score = report["score"].as_u64().unwrap();
        assert!(score > empty["score"].as_u64().unwrap());
        assert!(!report["suggestions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_render_preview() {
        let (server, _dir) = test_server().await;
        let rendered: Value = server
            .post("/api/v1/render")
            .json(&json!({ "content": "# Title\n\n*hi*" }))
            .await
            .json();
        assert!(rendered["html"].as_str().unwrap().contains("<em>hi</em>"));
        assert_eq!(rendered["toc"][0]["text"], "Title");
    }
}
