//! Article service
//!
//! Implements business logic for article management:
//! - Create, read, update, delete articles
//! - Slug generation and uniqueness
//! - Markdown rendering and SEO scoring on every write
//! - Tag associations
//! - Cache invalidation

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ArticleRepository, CategoryRepository};
use crate::models::{
    double_option, Article, ArticleFilter, ArticleStatus, CreateArticleInput, ListParams,
    PagedResult, SeoMeta, Tag, UpdateArticleInput,
};
use crate::services::markdown::{MarkdownRenderer, TocEntry};
use crate::services::seo::{self, SeoInput, SeoReport};
use crate::services::sitemap::invalidate_feeds;
use crate::services::slug::{is_valid_slug, slugify, MAX_SLUG_LENGTH};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Maximum title length in characters, after trimming
pub const MAX_TITLE_LENGTH: usize = 200;

/// Cache key prefixes
const CACHE_KEY_ARTICLE_BY_ID: &str = "article:id:";
const CACHE_KEY_ARTICLE_BY_SLUG: &str = "article:slug:";

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Duplicate slug
    #[error("Article slug already exists: {0}")]
    DuplicateSlug(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for ArticleServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(msg) => Self::NotFound(msg),
            TagServiceError::ValidationError(msg) => Self::ValidationError(msg),
            TagServiceError::DuplicateSlug(msg) => Self::DuplicateSlug(msg),
            TagServiceError::InternalError(err) => Self::InternalError(err),
        }
    }
}

/// Article as submitted by an editor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    /// Generated from the title when absent or blank
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub seo: SeoMeta,
    /// Tag names; missing tags are created
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArticleInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial article update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub featured_image: Option<Option<String>>,
    #[serde(default)]
    pub seo: Option<SeoMeta>,
    /// Replaces every tag when present
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Listing filters as accepted by the API
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub status: Option<ArticleStatus>,
    pub category_id: Option<i64>,
    /// Tag slug
    pub tag: Option<String>,
    /// Search text matched against title and content
    pub q: Option<String>,
}

impl ArticleQuery {
    pub fn published() -> Self {
        Self {
            status: Some(ArticleStatus::Published),
            ..Self::default()
        }
    }
}

/// Article service for managing blog articles
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    tags: Arc<TagService>,
    cache: Arc<Cache>,
    markdown_renderer: MarkdownRenderer,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        tags: Arc<TagService>,
        cache: Arc<Cache>,
        markdown_renderer: MarkdownRenderer,
    ) -> Self {
        Self {
            repo,
            category_repo,
            tags,
            cache,
            markdown_renderer,
        }
    }

    /// Create a new article
    ///
    /// # Errors
    /// - `ValidationError` if the title is blank or too long, the slug is
    ///   malformed, or the category does not exist
    /// - `DuplicateSlug` if the slug already exists
    pub async fn create(&self, input: ArticleInput) -> Result<Article, ArticleServiceError> {
        let title = validate_title(&input.title)?;
        let slug = resolve_slug(input.slug.as_deref(), title)?;

        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(ArticleServiceError::DuplicateSlug(slug));
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let create = CreateArticleInput {
            slug,
            title: title.to_string(),
            excerpt: non_blank(input.excerpt),
            content_html: self.markdown_renderer.render(&input.content),
            content: input.content,
            category_id: input.category_id,
            status: input.status,
            featured_image: non_blank(input.featured_image),
            seo: input.seo,
            seo_score: 0,
        };

        let article = self
            .repo
            .create(&create)
            .await
            .context("Failed to create article")?;

        let tags = self.tags.set_for_article(article.id, &input.tags).await?;
        let article = self.refresh_seo_score(article, &tags).await?;

        tracing::info!("Created article {} ({})", article.id, article.slug);
        self.invalidate_article_cache(article.id, &article.slug).await;
        Ok(article)
    }

    /// Get article by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Article>, ArticleServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_ARTICLE_BY_ID, id);
        if let Some(article) = self.cache.get::<Article>(&cache_key).await.ok().flatten() {
            return Ok(Some(article));
        }

        let article = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article by ID")?;

        if let Some(ref art) = article {
            let _ = self.cache.set(&cache_key, art, self.cache.default_ttl()).await;
        }

        Ok(article)
    }

    /// Get article by slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>, ArticleServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_ARTICLE_BY_SLUG, slug);
        if let Some(article) = self.cache.get::<Article>(&cache_key).await.ok().flatten() {
            return Ok(Some(article));
        }

        let article = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?;

        if let Some(ref art) = article {
            let _ = self.cache.set(&cache_key, art, self.cache.default_ttl()).await;
        }

        Ok(article)
    }

    /// List articles newest first.
    ///
    /// An unknown tag slug yields an empty page rather than an error.
    pub async fn list(
        &self,
        query: &ArticleQuery,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let tag_id = match query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(slug) => match self.tags.get_by_slug(slug).await? {
                Some(tag) => Some(tag.id),
                None => return Ok(PagedResult::new(Vec::new(), 0, params)),
            },
            None => None,
        };

        let filter = ArticleFilter {
            status: query.status,
            category_id: query.category_id,
            tag_id,
            query: query.q.clone(),
        };

        let articles = self
            .repo
            .list(&filter, params.offset(), params.limit())
            .await
            .context("Failed to list articles")?;
        let total = self
            .repo
            .count(&filter)
            .await
            .context("Failed to count articles")?;

        Ok(PagedResult::new(articles, total, params))
    }

    /// List only published articles
    pub async fn list_published(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        self.list(&ArticleQuery::published(), params).await
    }

    /// Count articles, optionally by status
    pub async fn count(&self, status: Option<ArticleStatus>) -> Result<i64, ArticleServiceError> {
        let filter = ArticleFilter {
            status,
            ..ArticleFilter::default()
        };
        self.repo
            .count(&filter)
            .await
            .context("Failed to count articles")
            .map_err(Into::into)
    }

    /// Update an article
    ///
    /// Content changes re-render the HTML. The SEO score is recomputed on
    /// every update. Moving to `published` for the first time records
    /// `published_at`.
    ///
    /// # Errors
    /// - `NotFound` if the article doesn't exist
    /// - `ValidationError` for a blank title, bad slug or unknown category
    /// - `DuplicateSlug` if the new slug already exists
    pub async fn update(&self, id: i64, patch: ArticlePatch) -> Result<Article, ArticleServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| {
                ArticleServiceError::NotFound(format!("Article with ID {} not found", id))
            })?;

        let title = match patch.title.as_deref() {
            Some(title) => Some(validate_title(title)?.to_string()),
            None => None,
        };

        let slug = match patch.slug.as_deref() {
            Some(slug) => {
                let slug = resolve_slug(Some(slug), title.as_deref().unwrap_or(&existing.title))?;
                if slug != existing.slug
                    && self
                        .repo
                        .exists_by_slug(&slug, Some(id))
                        .await
                        .context("Failed to check slug uniqueness")?
                {
                    return Err(ArticleServiceError::DuplicateSlug(slug));
                }
                Some(slug)
            }
            None => None,
        };

        if let Some(Some(category_id)) = patch.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let published_at = match patch.status {
            Some(ArticleStatus::Published) if existing.published_at.is_none() => Some(Utc::now()),
            _ => None,
        };

        let update = UpdateArticleInput {
            slug,
            title,
            excerpt: patch.excerpt.map(non_blank),
            content_html: patch
                .content
                .as_deref()
                .map(|content| self.markdown_renderer.render(content)),
            content: patch.content,
            category_id: patch.category_id,
            status: patch.status,
            featured_image: patch.featured_image.map(non_blank),
            seo: patch.seo,
            seo_score: None,
            published_at,
        };

        let article = self
            .repo
            .update(id, &update)
            .await
            .context("Failed to update article")?;

        let tags = match patch.tags {
            Some(names) => self.tags.set_for_article(id, &names).await?,
            None => self.tags.get_by_article(id).await?,
        };
        let article = self.refresh_seo_score(article, &tags).await?;

        // Drop both the old and the new slug
        self.invalidate_article_cache(id, &existing.slug).await;
        if article.slug != existing.slug {
            self.invalidate_article_cache(id, &article.slug).await;
        }

        Ok(article)
    }

    /// Delete an article with its tag links and comments
    pub async fn delete(&self, id: i64) -> Result<(), ArticleServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| {
                ArticleServiceError::NotFound(format!("Article with ID {} not found", id))
            })?;

        self.repo
            .delete(id)
            .await
            .context("Failed to delete article")?;

        tracing::info!("Deleted article {} ({})", id, existing.slug);
        self.invalidate_article_cache(id, &existing.slug).await;
        self.tags.invalidate_cache().await;
        Ok(())
    }

    /// Record a page view
    pub async fn increment_views(&self, id: i64) -> Result<(), ArticleServiceError> {
        self.repo
            .increment_views(id)
            .await
            .context("Failed to increment views")
            .map_err(Into::into)
    }

    /// Tags attached to an article
    pub async fn get_tags(&self, id: i64) -> Result<Vec<Tag>, ArticleServiceError> {
        Ok(self.tags.get_by_article(id).await?)
    }

    /// Replace an article's tags by name and rescore it
    pub async fn set_tags(&self, id: i64, names: &[String]) -> Result<Vec<Tag>, ArticleServiceError> {
        let article = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| {
                ArticleServiceError::NotFound(format!("Article with ID {} not found", id))
            })?;

        let tags = self.tags.set_for_article(id, names).await?;
        self.refresh_seo_score(article.clone(), &tags).await?;
        self.invalidate_article_cache(id, &article.slug).await;
        Ok(tags)
    }

    /// Full SEO report for a stored article
    pub async fn seo_report(&self, id: i64) -> Result<SeoReport, ArticleServiceError> {
        let article = self.get_by_id(id).await?.ok_or_else(|| {
            ArticleServiceError::NotFound(format!("Article with ID {} not found", id))
        })?;
        let tags = self.get_tags(id).await?;
        Ok(seo::analyze(&SeoInput::from_article(&article, &tags)))
    }

    /// Render Markdown to HTML along with its table of contents
    pub fn render_markdown(&self, content: &str) -> (String, Vec<TocEntry>) {
        self.markdown_renderer.render_with_toc(content)
    }

    /// Drop cached copies of one article plus the derived sitemap and feed
    pub async fn invalidate_article_cache(&self, id: i64, slug: &str) {
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_ARTICLE_BY_ID, id))
            .await;
        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_ARTICLE_BY_SLUG, slug))
            .await;
        invalidate_feeds(&self.cache).await;
    }

    /// Drop every cached article, e.g. after a category delete detaches many
    pub async fn invalidate_all(&self) {
        let _ = self.cache.delete_pattern("article:*").await;
        invalidate_feeds(&self.cache).await;
    }

    async fn refresh_seo_score(
        &self,
        article: Article,
        tags: &[Tag],
    ) -> Result<Article, ArticleServiceError> {
        let report = seo::analyze(&SeoInput::from_article(&article, tags));
        let score = i32::from(report.score);
        if score == article.seo_score {
            return Ok(article);
        }

        tracing::debug!(
            "Article {} SEO score {} -> {}",
            article.id,
            article.seo_score,
            score
        );
        let update = UpdateArticleInput {
            seo_score: Some(score),
            ..UpdateArticleInput::default()
        };
        self.repo
            .update(article.id, &update)
            .await
            .context("Failed to store SEO score")
            .map_err(Into::into)
    }

    async fn ensure_category_exists(&self, category_id: i64) -> Result<(), ArticleServiceError> {
        let category = self
            .category_repo
            .get_by_id(category_id)
            .await
            .context("Failed to get category")?;
        if category.is_none() {
            return Err(ArticleServiceError::ValidationError(format!(
                "Category {} does not exist",
                category_id
            )));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<&str, ArticleServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Article title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ArticleServiceError::ValidationError(format!(
            "Article title cannot exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title)
}

/// Use the explicit slug when given, else derive one from the title
fn resolve_slug(slug: Option<&str>, title: &str) -> Result<String, ArticleServiceError> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(slug) => Err(ArticleServiceError::ValidationError(format!(
            "Invalid slug: {}",
            slug
        ))),
        None => {
            let slug: String = slugify(title).chars().take(MAX_SLUG_LENGTH).collect();
            let slug = slug.trim_end_matches('-').to_string();
            if slug.is_empty() {
                return Err(ArticleServiceError::ValidationError(
                    "Cannot generate a slug from the title; provide one".to_string(),
                ));
            }
            Ok(slug)
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        CommentRepository, SqlxArticleRepository, SqlxCategoryRepository, SqlxCommentRepository,
        SqlxTagRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CommentStatus, CreateCategoryInput, CreateCommentInput};

    async fn setup_test_service() -> (DynDatabasePool, ArticleService) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = create_cache(&CacheConfig::default());
        let tags = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let service = ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            tags,
            cache,
            MarkdownRenderer::new(),
        );

        (pool, service)
    }

    async fn create_category(pool: &DynDatabasePool, slug: &str) -> i64 {
        SqlxCategoryRepository::new(pool.clone())
            .create(&CreateCategoryInput {
                slug: slug.to_string(),
                name: slug.to_string(),
                description: None,
                parent_id: None,
                sort_order: 0,
            })
            .await
            .expect("Failed to create category")
            .id
    }

    #[tokio::test]
    async fn test_create_article_success() {
        let (_pool, service) = setup_test_service().await;
        let article = service
            .create(ArticleInput::new("Hello World", "# Hi\n\nSome **bold** text."))
            .await
            .unwrap();

        assert_eq!(article.slug, "hello-world");
        assert_eq!(article.status, ArticleStatus::Draft);
        assert!(article.content_html.contains("<strong>bold</strong>"));
        assert!(article.published_at.is_none());
    }

    #[tokio::test]
    async fn test_create_article_empty_title_fails() {
        let (_pool, service) = setup_test_service().await;
        let result = service.create(ArticleInput::new("   ", "content")).await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_article_title_too_long_fails() {
        let (_pool, service) = setup_test_service().await;
        let result = service
            .create(ArticleInput::new("t".repeat(MAX_TITLE_LENGTH + 1), ""))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        let ok = service
            .create(ArticleInput::new("t".repeat(MAX_TITLE_LENGTH), ""))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_create_article_invalid_slug_fails() {
        let (_pool, service) = setup_test_service().await;
        let result = service
            .create(ArticleInput::new("Title", "").with_slug("Not A Slug"))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_article_duplicate_slug_fails() {
        let (_pool, service) = setup_test_service().await;
        service
            .create(ArticleInput::new("First", "").with_slug("same"))
            .await
            .unwrap();
        let result = service
            .create(ArticleInput::new("Second", "").with_slug("same"))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_create_article_unknown_category_fails() {
        let (pool, service) = setup_test_service().await;
        let result = service
            .create(ArticleInput::new("Title", "").with_category(42))
            .await;
        assert!(matches!(result, Err(ArticleServiceError::ValidationError(_))));

        let category_id = create_category(&pool, "news").await;
        let article = service
            .create(ArticleInput::new("Title", "").with_category(category_id))
            .await
            .unwrap();
        assert_eq!(article.category_id, Some(category_id));
    }

    #[tokio::test]
    async fn test_create_with_tags_and_seo_score() {
        let (_pool, service) = setup_test_service().await;
        let article = service
            .create(
                ArticleInput::new("Rust tips", "# Rust\n\nRust is great.")
                    .with_tags(["Rust", "Tips", "Rust"]),
            )
            .await
            .unwrap();

        let tags = service.get_tags(article.id).await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Rust", "Tips"]);

        let report = service.seo_report(article.id).await.unwrap();
        assert_eq!(article.seo_score, i32::from(report.score));
        assert!(article.seo_score > 0);
    }

    #[tokio::test]
    async fn test_published_at_set_once() {
        let (_pool, service) = setup_test_service().await;
        let article = service.create(ArticleInput::new("Draft", "")).await.unwrap();
        assert!(article.published_at.is_none());

        let published = service
            .update(
                article.id,
                ArticlePatch {
                    status: Some(ArticleStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let first = published.published_at.expect("published_at should be set");

        service
            .update(
                article.id,
                ArticlePatch {
                    status: Some(ArticleStatus::Draft),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let republished = service
            .update(
                article.id,
                ArticlePatch {
                    status: Some(ArticleStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(republished.published_at, Some(first));
    }

    #[tokio::test]
    async fn test_update_rerenders_and_invalidates_cache() {
        let (_pool, service) = setup_test_service().await;
        let article = service
            .create(ArticleInput::new("Old", "old body").with_slug("old"))
            .await
            .unwrap();

        // Warm the caches
        service.get_by_id(article.id).await.unwrap();
        service.get_by_slug("old").await.unwrap();

        let updated = service
            .update(
                article.id,
                ArticlePatch {
                    title: Some("New".to_string()),
                    slug: Some("new".to_string()),
                    content: Some("*new* body".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.content_html.contains("<em>new</em>"));

        let by_id = service.get_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(by_id.title, "New");
        assert!(service.get_by_slug("old").await.unwrap().is_none());
        assert!(service.get_by_slug("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_duplicate_slug_fails() {
        let (_pool, service) = setup_test_service().await;
        service
            .create(ArticleInput::new("A", "").with_slug("a"))
            .await
            .unwrap();
        let b = service
            .create(ArticleInput::new("B", "").with_slug("b"))
            .await
            .unwrap();

        let result = service
            .update(
                b.id,
                ArticlePatch {
                    slug: Some("a".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ArticleServiceError::DuplicateSlug(_))));

        // Keeping its own slug is fine
        let same = service
            .update(
                b.id,
                ArticlePatch {
                    slug: Some("b".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let (_pool, service) = setup_test_service().await;
        let result = service.update(999, ArticlePatch::default()).await;
        assert!(matches!(result, Err(ArticleServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_clears_excerpt_and_replaces_tags() {
        let (_pool, service) = setup_test_service().await;
        let mut input = ArticleInput::new("Title", "").with_tags(["a", "b"]);
        input.excerpt = Some("Summary".to_string());
        let article = service.create(input).await.unwrap();

        let updated = service
            .update(
                article.id,
                ArticlePatch {
                    excerpt: Some(None),
                    tags: Some(vec!["c".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.excerpt.is_none());

        let tags = service.get_tags(article.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "c");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (pool, service) = setup_test_service().await;
        let news = create_category(&pool, "news").await;

        service
            .create(
                ArticleInput::new("Rust news", "about rust")
                    .with_status(ArticleStatus::Published)
                    .with_category(news)
                    .with_tags(["rust"]),
            )
            .await
            .unwrap();
        service
            .create(ArticleInput::new("Go draft", "about go").with_tags(["go"]))
            .await
            .unwrap();

        let params = ListParams::new(1, 10);
        let all = service.list(&ArticleQuery::default(), &params).await.unwrap();
        assert_eq!(all.total, 2);

        let published = service.list_published(&params).await.unwrap();
        assert_eq!(published.total, 1);
        assert_eq!(published.items[0].title, "Rust news");

        let by_tag = ArticleQuery {
            tag: Some("go".to_string()),
            ..Default::default()
        };
        assert_eq!(service.list(&by_tag, &params).await.unwrap().total, 1);

        let unknown_tag = ArticleQuery {
            tag: Some("missing".to_string()),
            ..Default::default()
        };
        let empty = service.list(&unknown_tag, &params).await.unwrap();
        assert_eq!(empty.total, 0);
        assert!(empty.items.is_empty());

        let by_category = ArticleQuery {
            category_id: Some(news),
            ..Default::default()
        };
        assert_eq!(service.list(&by_category, &params).await.unwrap().total, 1);

        let search = ArticleQuery {
            q: Some("go".to_string()),
            ..Default::default()
        };
        assert_eq!(service.list(&search, &params).await.unwrap().total, 1);

        assert_eq!(service.count(None).await.unwrap(), 2);
        assert_eq!(service.count(Some(ArticleStatus::Draft)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_comments() {
        let (pool, service) = setup_test_service().await;
        let article = service
            .create(ArticleInput::new("Doomed", "").with_status(ArticleStatus::Published))
            .await
            .unwrap();

        let comments = SqlxCommentRepository::new(pool.clone());
        comments
            .create(&CreateCommentInput {
                article_id: article.id,
                parent_id: None,
                author_name: "Ann".to_string(),
                author_email: "ann@example.com".to_string(),
                author_url: None,
                content: "Nice".to_string(),
                status: CommentStatus::Approved,
            })
            .await
            .unwrap();

        service.delete(article.id).await.unwrap();
        assert!(service.get_by_id(article.id).await.unwrap().is_none());
        assert_eq!(comments.count(None).await.unwrap(), 0);

        let again = service.delete(article.id).await;
        assert!(matches!(again, Err(ArticleServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_increment_views() {
        let (_pool, service) = setup_test_service().await;
        let article = service.create(ArticleInput::new("Viewed", "")).await.unwrap();
        service.increment_views(article.id).await.unwrap();
        service.increment_views(article.id).await.unwrap();

        // get_by_id may be cached; the slug lookup was never warmed
        let fresh = service.get_by_slug(&article.slug).await.unwrap().unwrap();
        assert_eq!(fresh.view_count, 2);
    }

    #[tokio::test]
    async fn test_set_tags_rescores() {
        let (_pool, service) = setup_test_service().await;
        let article = service
            .create(ArticleInput::new("Tagged article", "Tagged content"))
            .await
            .unwrap();

        let tags = service
            .set_tags(article.id, &["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(tags.len(), 2);

        let stored = service.get_by_id(article.id).await.unwrap().unwrap();
        let report = service.seo_report(article.id).await.unwrap();
        assert_eq!(stored.seo_score, i32::from(report.score));
        assert!(report.check("tags").unwrap().passed);

        assert!(matches!(
            service.set_tags(999, &[]).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug(None, "Hello, World!").unwrap(), "hello-world");
        assert_eq!(resolve_slug(Some("  "), "Hi there").unwrap(), "hi-there");
        assert_eq!(resolve_slug(Some("custom"), "ignored").unwrap(), "custom");
        assert!(resolve_slug(None, "!!!").is_err());
        assert!(resolve_slug(Some("../etc"), "x").is_err());
    }

    #[test]
    fn test_patch_deserialization() {
        let patch: ArticlePatch =
            serde_json::from_str(r#"{"excerpt": null, "category_id": 3, "status": "published"}"#)
                .unwrap();
        assert_eq!(patch.excerpt, Some(None));
        assert_eq!(patch.category_id, Some(Some(3)));
        assert_eq!(patch.status, Some(ArticleStatus::Published));
        assert!(patch.title.is_none());
        assert!(patch.featured_image.is_none());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            #[test]
            fn created_article_roundtrips(
                title in "[a-zA-Z][a-zA-Z ]{0,40}",
                content in "[a-zA-Z0-9 \n#*]{0,200}",
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let (_pool, service) = setup_test_service().await;
                    let created = service
                        .create(ArticleInput::new(title.clone(), content.clone()))
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;

                    let fetched = service
                        .get_by_slug(&created.slug)
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?
                        .ok_or_else(|| TestCaseError::fail("article missing"))?;

                    prop_assert_eq!(fetched.id, created.id);
                    prop_assert_eq!(fetched.title, title.trim());
                    prop_assert_eq!(fetched.content, content);
                    prop_assert!(is_valid_slug(&fetched.slug));
                    prop_assert!((0..=100).contains(&fetched.seo_score));
                    Ok(())
                });
                result?;
            }
        }
    }
}
