//! Article API endpoints
//!
//! - GET    /api/v1/articles            - List articles (page, per_page, status, category_id, tag, q)
//! - POST   /api/v1/articles            - Create article
//! - GET    /api/v1/articles/{id}       - Get article by ID
//! - PUT    /api/v1/articles/{id}       - Update article
//! - DELETE /api/v1/articles/{id}       - Delete article
//! - GET    /api/v1/articles/slug/{slug} - Get article by slug
//! - GET    /api/v1/articles/{id}/seo   - SEO report for a stored article
//! - GET/POST /api/v1/articles/{id}/comments - see `comments`

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::comments;
use crate::api::common::{default_page, default_per_page, parse_filter, PageResponse};
use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState};
use crate::api::responses::ArticleResponse;
use crate::models::{Article, ArticleStatus, ListParams};
use crate::services::{ArticleInput, ArticlePatch, ArticleQuery, SeoReport};

/// Query parameters for listing articles
#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// draft, published or archived; all statuses when absent
    pub status: Option<String>,
    pub category_id: Option<i64>,
    /// Tag slug
    pub tag: Option<String>,
    /// Search text
    pub q: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route(
            "/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/slug/{slug}", get(get_article_by_slug))
        .route("/{id}/seo", get(get_article_seo))
        .route(
            "/{id}/comments",
            get(comments::list_article_comments).post(comments::create_comment),
        )
}

/// Attach category and tags (and optionally the table of contents)
async fn to_response(
    state: &AppState,
    article: Article,
    with_toc: bool,
) -> Result<ArticleResponse, ApiError> {
    let category = match article.category_id {
        Some(id) => state.category_service.get_by_id(id).await?,
        None => None,
    };
    let tags = state.article_service.get_tags(article.id).await?;
    let toc = with_toc.then(|| state.article_service.render_markdown(&article.content).1);

    let response = ArticleResponse::from(article)
        .with_category(category)
        .with_tags(tags);
    Ok(match toc {
        Some(toc) => response.with_toc(toc),
        None => response,
    })
}

/// GET /api/v1/articles
pub async fn list_articles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListArticlesQuery>,
) -> Result<Json<PageResponse<ArticleResponse>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let filter = ArticleQuery {
        status: parse_filter::<ArticleStatus>("status", query.status.as_deref())?,
        category_id: query.category_id,
        tag: query.tag.filter(|t| !t.trim().is_empty()),
        q: query.q,
    };

    let result = state.article_service.list(&filter, &params).await?;
    let total = result.total;
    let total_pages = result.total_pages();

    let mut items = Vec::with_capacity(result.items.len());
    for article in result.items {
        items.push(to_response(&state, article, false).await?);
    }

    Ok(Json(PageResponse {
        items,
        total,
        page: params.page,
        per_page: params.per_page,
        total_pages,
    }))
}

/// POST /api/v1/articles
pub async fn create_article(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ArticleInput>,
) -> Result<(StatusCode, Json<ArticleResponse>), ApiError> {
    let article = state.article_service.create(input).await?;
    let response = to_response(&state, article, true).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/articles/{id}
pub async fn get_article(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .article_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article not found: {}", id)))?;
    Ok(Json(to_response(&state, article, true).await?))
}

/// GET /api/v1/articles/slug/{slug}
pub async fn get_article_by_slug(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .article_service
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article not found: {}", slug)))?;
    Ok(Json(to_response(&state, article, true).await?))
}

/// PUT /api/v1/articles/{id}
pub async fn update_article(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<ArticlePatch>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.update(id, patch).await?;
    Ok(Json(to_response(&state, article, true).await?))
}

/// DELETE /api/v1/articles/{id}
pub async fn delete_article(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/articles/{id}/seo
pub async fn get_article_seo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<SeoReport>, ApiError> {
    Ok(Json(state.article_service.seo_report(id).await?))
}
