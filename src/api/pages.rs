//! Server-rendered HTML pages
//!
//! - GET /                  - Published articles, newest first (`?page`)
//! - GET /posts/{slug}      - Single article with comments
//! - GET /categories/{slug} - Category archive
//! - GET /tags/{slug}       - Tag archive
//!
//! Unknown slugs render `error.html` with a 404. A failed template renders
//! the fallback error page with a 500.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::api::common::default_page;
use crate::api::middleware::AppState;
use crate::models::{Article, ArticleStatus, Category, CommentTree, ListParams, PagedResult};
use crate::services::markdown::summarize;
use crate::services::{ArticleQuery, SiteSettings};
use crate::theme::{simple_error_page, PageMeta, RenderedPage, ERROR_TEMPLATE};

const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Template and context of a successfully resolved page
type Resolved = Option<(&'static str, Context)>;

/// Article as shown in a listing
#[derive(Debug, Serialize)]
struct ArticleCard {
    title: String,
    path: String,
    summary: String,
    published_at: Option<DateTime<Utc>>,
}

impl From<&Article> for ArticleCard {
    fn from(article: &Article) -> Self {
        let summary = article
            .excerpt
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| summarize(&article.content, SUMMARY_CHARS));
        Self {
            title: article.title.clone(),
            path: article.path(),
            summary,
            published_at: article.published_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct Pagination {
    page: u32,
    total_pages: u32,
    has_prev: bool,
    has_next: bool,
    base_path: String,
}

impl Pagination {
    fn new(result: &PagedResult<Article>, base_path: &str) -> Self {
        Self {
            page: result.page,
            total_pages: result.total_pages(),
            has_prev: result.has_prev(),
            has_next: result.has_next(),
            base_path: base_path.to_string(),
        }
    }
}

/// Data every page shares: site settings, base URL and the category nav
struct Frame {
    site: SiteSettings,
    base_url: String,
    categories: Vec<Category>,
}

impl Frame {
    async fn load(state: &AppState) -> anyhow::Result<Self> {
        Ok(Self {
            site: state.settings_service.get_site_settings().await?,
            base_url: state.sitemap_service.base_url().await?,
            categories: state.category_service.list().await?,
        })
    }

    fn context(&self, meta: &PageMeta) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site);
        context.insert("meta", meta);
        context.insert("categories", &self.categories);
        context.insert("year", &Utc::now().year());
        context
    }

    fn listing_context(
        &self,
        meta: &PageMeta,
        result: &PagedResult<Article>,
        base_path: &str,
    ) -> Context {
        let cards: Vec<ArticleCard> = result.items.iter().map(ArticleCard::from).collect();
        let mut context = self.context(meta);
        context.insert("articles", &cards);
        context.insert("pagination", &Pagination::new(result, base_path));
        context
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/posts/{slug}", get(article))
        .route("/categories/{slug}", get(category))
        .route("/tags/{slug}", get(tag))
}

/// GET /
pub async fn home(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let result = resolve_home(&state, query.page).await;
    respond(&state, "/", result).await
}

/// GET /posts/{slug}
pub async fn article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    uri: Uri,
) -> Response {
    let result = resolve_article(&state, &slug).await;
    respond(&state, uri.path(), result).await
}

/// GET /categories/{slug}
pub async fn category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    let result = resolve_category(&state, &slug, query.page).await;
    respond(&state, uri.path(), result).await
}

/// GET /tags/{slug}
pub async fn tag(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    let result = resolve_tag(&state, &slug, query.page).await;
    respond(&state, uri.path(), result).await
}

/// Router fallback for anything unmatched
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    not_found_response(&state, uri.path()).await
}

async fn resolve_home(state: &AppState, page: u32) -> anyhow::Result<Resolved> {
    let frame = Frame::load(state).await?;
    let params = ListParams::new(page, frame.site.posts_per_page);
    let result = state.article_service.list_published(&params).await?;

    let meta = PageMeta::site(&frame.site, &frame.base_url, &paged_path("/", params.page));
    Ok(Some(("index.html", frame.listing_context(&meta, &result, "/"))))
}

async fn resolve_article(state: &AppState, slug: &str) -> anyhow::Result<Resolved> {
    let Some(mut article) = state
        .article_service
        .get_by_slug(slug)
        .await?
        .filter(Article::is_published)
    else {
        return Ok(None);
    };

    state.article_service.increment_views(article.id).await?;
    article.view_count += 1;

    let tags = state.article_service.get_tags(article.id).await?;
    let category = match article.category_id {
        Some(id) => state.category_service.get_by_id(id).await?,
        None => None,
    };
    let comments = state.comment_service.list_for_article(article.id).await?;
    let (content_html, toc) = state.article_service.render_markdown(&article.content);

    let frame = Frame::load(state).await?;
    let meta = PageMeta::article(&article, &tags, &frame.site, &frame.base_url);
    let mut context = frame.context(&meta);
    context.insert("article", &article);
    context.insert("category", &category);
    context.insert("tags", &tags);
    context.insert("toc", &toc);
    context.insert("content_html", &content_html);
    context.insert("comment_count", &count_comments(&comments));
    context.insert("comments", &comments);
    Ok(Some(("article.html", context)))
}

async fn resolve_category(state: &AppState, slug: &str, page: u32) -> anyhow::Result<Resolved> {
    let Some(category) = state.category_service.get_by_slug(slug).await? else {
        return Ok(None);
    };

    let frame = Frame::load(state).await?;
    let params = ListParams::new(page, frame.site.posts_per_page);
    let query = ArticleQuery {
        status: Some(ArticleStatus::Published),
        category_id: Some(category.id),
        ..ArticleQuery::default()
    };
    let result = state.article_service.list(&query, &params).await?;

    let base_path = category.path();
    let meta = PageMeta::listing(
        &category.name,
        category.description.as_deref(),
        &frame.site,
        &frame.base_url,
        &paged_path(&base_path, params.page),
    );
    let mut context = frame.listing_context(&meta, &result, &base_path);
    context.insert("category", &category);
    Ok(Some(("category.html", context)))
}

async fn resolve_tag(state: &AppState, slug: &str, page: u32) -> anyhow::Result<Resolved> {
    let Some(tag) = state.tag_service.get_by_slug(slug).await? else {
        return Ok(None);
    };

    let frame = Frame::load(state).await?;
    let params = ListParams::new(page, frame.site.posts_per_page);
    let query = ArticleQuery {
        status: Some(ArticleStatus::Published),
        tag: Some(tag.slug.clone()),
        ..ArticleQuery::default()
    };
    let result = state.article_service.list(&query, &params).await?;

    let base_path = tag.path();
    let title = format!("Tagged \u{201c}{}\u{201d}", tag.name);
    let meta = PageMeta::listing(
        &title,
        None,
        &frame.site,
        &frame.base_url,
        &paged_path(&base_path, params.page),
    );
    let mut context = frame.listing_context(&meta, &result, &base_path);
    context.insert("tag", &tag);
    Ok(Some(("tag.html", context)))
}

fn paged_path(base_path: &str, page: u32) -> String {
    if page > 1 {
        format!("{}?page={}", base_path, page)
    } else {
        base_path.to_string()
    }
}

fn count_comments(nodes: &[CommentTree]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_comments(&node.replies))
        .sum()
}

async fn respond(state: &AppState, path: &str, result: anyhow::Result<Resolved>) -> Response {
    match result {
        Ok(Some((template, context))) => render(state, template, &context, StatusCode::OK),
        Ok(None) => not_found_response(state, path).await,
        Err(e) => {
            tracing::error!("Failed to build page {}: {:#}", path, e);
            error_response(
                state,
                path,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The page could not be loaded. Please try again later.",
            )
            .await
        }
    }
}

async fn not_found_response(state: &AppState, path: &str) -> Response {
    error_response(
        state,
        path,
        StatusCode::NOT_FOUND,
        "Page not found",
        "The page you are looking for does not exist.",
    )
    .await
}

async fn error_response(
    state: &AppState,
    path: &str,
    status: StatusCode,
    title: &str,
    message: &str,
) -> Response {
    let frame = match Frame::load(state).await {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Failed to load site data for error page: {:#}", e);
            return (status, Html(simple_error_page())).into_response();
        }
    };

    let meta = PageMeta::error(title, &frame.site, &frame.base_url, path);
    let mut context = frame.context(&meta);
    context.insert("status", &status.as_u16());
    context.insert("error_title", title);
    context.insert("error_message", message);
    render(state, ERROR_TEMPLATE, &context, status)
}

fn render(state: &AppState, template: &str, context: &Context, status: StatusCode) -> Response {
    let page = match state.theme_engine.read() {
        Ok(engine) => engine.render_with_fallback(template, context),
        Err(_) => {
            tracing::error!("Theme engine lock poisoned");
            RenderedPage {
                html: simple_error_page(),
                fallback: true,
            }
        }
    };

    let status = if page.fallback {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        status
    };
    (status, Html(page.html)).into_response()
}
