//! Article repository
//!
//! - `ArticleRepository` trait defining article data access
//! - `SqlxArticleRepository` implementing it for SQLite and MySQL

use crate::db::{on_backend, Backend, DynDatabasePool};
use crate::models::{
    Article, ArticleFilter, ArticleStatus, CreateArticleInput, SeoMeta, UpdateArticleInput,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article
    async fn create(&self, input: &CreateArticleInput) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Get article by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// List articles matching `filter`, newest first
    async fn list(&self, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>>;

    /// Count articles matching `filter`
    async fn count(&self, filter: &ArticleFilter) -> Result<i64>;

    /// Update an article, returning the new state
    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article>;

    /// Delete an article. Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a slug is taken, optionally ignoring one article (for updates)
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Increment the view counter
    async fn increment_views(&self, id: i64) -> Result<()>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const ARTICLE_COLUMNS: &str = "id, slug, title, excerpt, content, content_html, category_id, status, \
     featured_image, meta_title, meta_description, meta_keywords, focus_keyword, canonical_url, \
     og_image, noindex, seo_score, view_count, published_at, created_at, updated_at";

/// Raw `articles` row; `status` is validated on conversion
#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    excerpt: Option<String>,
    content: String,
    content_html: String,
    category_id: Option<i64>,
    status: String,
    featured_image: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    meta_keywords: Option<String>,
    focus_keyword: Option<String>,
    canonical_url: Option<String>,
    og_image: Option<String>,
    noindex: bool,
    seo_score: i32,
    view_count: i64,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = anyhow::Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let status = row
            .status
            .parse::<ArticleStatus>()
            .map_err(anyhow::Error::msg)?;

        Ok(Article {
            id: row.id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            content: row.content,
            content_html: row.content_html,
            category_id: row.category_id,
            status,
            featured_image: row.featured_image,
            seo: SeoMeta {
                meta_title: row.meta_title,
                meta_description: row.meta_description,
                meta_keywords: row.meta_keywords,
                focus_keyword: row.focus_keyword,
                canonical_url: row.canonical_url,
                og_image: row.og_image,
                noindex: row.noindex,
            },
            seo_score: row.seo_score,
            view_count: row.view_count,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A bound parameter of a filter clause
#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Text(String),
    Int(i64),
}

/// Build the WHERE clause for `filter` with positional `?` parameters.
///
/// Returns an empty string when nothing is filtered.
fn filter_clause(filter: &ArticleFilter) -> (String, Vec<FilterArg>) {
    let mut conditions = Vec::new();
    let mut args = Vec::new();

    if let Some(status) = filter.status {
        conditions.push("status = ?");
        args.push(FilterArg::Text(status.as_str().to_string()));
    }
    if let Some(category_id) = filter.category_id {
        conditions.push("category_id = ?");
        args.push(FilterArg::Int(category_id));
    }
    if let Some(tag_id) = filter.tag_id {
        conditions.push("id IN (SELECT article_id FROM article_tags WHERE tag_id = ?)");
        args.push(FilterArg::Int(tag_id));
    }
    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", query);
        conditions.push("(title LIKE ? OR content LIKE ?)");
        args.push(FilterArg::Text(pattern.clone()));
        args.push(FilterArg::Text(pattern));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), args)
    }
}

/// Bind filter arguments onto a query in order
macro_rules! bind_filter_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                FilterArg::Text(text) => query.bind(text.clone()),
                FilterArg::Int(value) => query.bind(*value),
            };
        }
        query
    }};
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        let now = Utc::now();
        let published_at = (input.status == ArticleStatus::Published).then_some(now);
        const SQL: &str = "INSERT INTO articles (slug, title, excerpt, content, content_html, \
             category_id, status, featured_image, meta_title, meta_description, meta_keywords, \
             focus_keyword, canonical_url, og_image, noindex, seo_score, view_count, published_at, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)";

        macro_rules! insert {
            ($p:expr) => {
                sqlx::query(SQL)
                    .bind(&input.slug)
                    .bind(&input.title)
                    .bind(&input.excerpt)
                    .bind(&input.content)
                    .bind(&input.content_html)
                    .bind(input.category_id)
                    .bind(input.status.as_str())
                    .bind(&input.featured_image)
                    .bind(&input.seo.meta_title)
                    .bind(&input.seo.meta_description)
                    .bind(&input.seo.meta_keywords)
                    .bind(&input.seo.focus_keyword)
                    .bind(&input.seo.canonical_url)
                    .bind(&input.seo.og_image)
                    .bind(input.seo.noindex)
                    .bind(input.seo_score)
                    .bind(published_at)
                    .bind(now)
                    .bind(now)
                    .execute($p)
                    .await
                    .context("Failed to create article")?
            };
        }

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => insert!(p).last_insert_rowid(),
            Backend::Mysql(p) => insert!(p).last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .context("Article not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        let row: Option<ArticleRow> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get article by id")?
        });
        row.map(Article::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS);
        let row: Option<ArticleRow> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get article by slug")?
        });
        row.map(Article::try_from).transpose()
    }

    async fn list(&self, filter: &ArticleFilter, offset: i64, limit: i64) -> Result<Vec<Article>> {
        let (clause, args) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM articles{} ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ? OFFSET ?",
            ARTICLE_COLUMNS, clause
        );
        let rows: Vec<ArticleRow> = on_backend!(self.pool, |p| {
            bind_filter_args!(sqlx::query_as(&sql), &args)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list articles")?
        });
        rows.into_iter().map(Article::try_from).collect()
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<i64> {
        let (clause, args) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM articles{}", clause);
        let count: i64 = on_backend!(self.pool, |p| {
            bind_filter_args!(sqlx::query_scalar(&sql), &args)
                .fetch_one(p)
                .await
                .context("Failed to count articles")?
        });
        Ok(count)
    }

    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article> {
        let existing = self
            .get_by_id(id)
            .await?
            .with_context(|| format!("Article {} not found", id))?;

        let slug = input.slug.as_ref().unwrap_or(&existing.slug);
        let title = input.title.as_ref().unwrap_or(&existing.title);
        let excerpt = input.excerpt.clone().unwrap_or(existing.excerpt.clone());
        let content = input.content.as_ref().unwrap_or(&existing.content);
        let content_html = input.content_html.as_ref().unwrap_or(&existing.content_html);
        let category_id = input.category_id.unwrap_or(existing.category_id);
        let status = input.status.unwrap_or(existing.status);
        let featured_image = input
            .featured_image
            .clone()
            .unwrap_or(existing.featured_image.clone());
        let seo = input.seo.as_ref().unwrap_or(&existing.seo);
        let seo_score = input.seo_score.unwrap_or(existing.seo_score);
        let published_at = input.published_at.or(existing.published_at);

        const SQL: &str = "UPDATE articles SET slug = ?, title = ?, excerpt = ?, content = ?, \
             content_html = ?, category_id = ?, status = ?, featured_image = ?, meta_title = ?, \
             meta_description = ?, meta_keywords = ?, focus_keyword = ?, canonical_url = ?, \
             og_image = ?, noindex = ?, seo_score = ?, published_at = ?, updated_at = ? WHERE id = ?";

        on_backend!(self.pool, |p| {
            sqlx::query(SQL)
                .bind(slug)
                .bind(title)
                .bind(&excerpt)
                .bind(content)
                .bind(content_html)
                .bind(category_id)
                .bind(status.as_str())
                .bind(&featured_image)
                .bind(&seo.meta_title)
                .bind(&seo.meta_description)
                .bind(&seo.meta_keywords)
                .bind(&seo.focus_keyword)
                .bind(&seo.canonical_url)
                .bind(&seo.og_image)
                .bind(seo.noindex)
                .bind(seo_score)
                .bind(published_at)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update article")?;
        });

        self.get_by_id(id)
            .await?
            .context("Article not found after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // article_tags and comments go with it through ON DELETE CASCADE
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("DELETE FROM articles WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete article")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = on_backend!(self.pool, |p| {
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(p)
                .await
                .context("Failed to check article slug")?
        });
        Ok(count > 0)
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        on_backend!(self.pool, |p| {
            sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment view count")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxArticleRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxArticleRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_category(pool: &DynDatabasePool, slug: &str) -> i64 {
        sqlx::query("INSERT INTO categories (slug, name) VALUES (?, ?)")
            .bind(slug)
            .bind(slug)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[test]
    fn test_filter_clause_empty() {
        let (clause, args) = filter_clause(&ArticleFilter::default());
        assert!(clause.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn test_filter_clause_combines_conditions() {
        let filter = ArticleFilter {
            status: Some(ArticleStatus::Published),
            category_id: Some(3),
            tag_id: None,
            query: Some(" rust ".to_string()),
        };
        let (clause, args) = filter_clause(&filter);
        assert_eq!(
            clause,
            " WHERE status = ? AND category_id = ? AND (title LIKE ? OR content LIKE ?)"
        );
        assert_eq!(
            args,
            vec![
                FilterArg::Text("published".to_string()),
                FilterArg::Int(3),
                FilterArg::Text("%rust%".to_string()),
                FilterArg::Text("%rust%".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;

        let mut input = CreateArticleInput::new("hello-world", "Hello World", "# Hi");
        input.seo.focus_keyword = Some("hello".to_string());
        input.seo.noindex = true;
        input.seo_score = 42;
        let created = repo.create(&input).await.expect("Failed to create article");

        assert!(created.id > 0);
        assert_eq!(created.status, ArticleStatus::Draft);
        assert!(created.published_at.is_none());
        assert_eq!(created.seo.focus_keyword.as_deref(), Some("hello"));
        assert!(created.seo.noindex);
        assert_eq!(created.seo_score, 42);

        let by_slug = repo.get_by_slug("hello-world").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_published_sets_published_at() {
        let (_pool, repo) = setup_test_repo().await;
        let input = CreateArticleInput::new("p", "P", "").with_status(ArticleStatus::Published);
        let created = repo.create(&input).await.unwrap();
        assert!(created.published_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_slug_fails() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&CreateArticleInput::new("dup", "A", "")).await.unwrap();
        assert!(repo.create(&CreateArticleInput::new("dup", "B", "")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_and_count_with_filters() {
        let (pool, repo) = setup_test_repo().await;
        let news = create_category(&pool, "news").await;

        for i in 0..3 {
            let input = CreateArticleInput::new(format!("pub-{}", i), format!("Rust {}", i), "body")
                .with_status(ArticleStatus::Published)
                .with_category(news);
            repo.create(&input).await.unwrap();
        }
        repo.create(&CreateArticleInput::new("draft", "Draft about Go", "body"))
            .await
            .unwrap();

        assert_eq!(repo.count(&ArticleFilter::default()).await.unwrap(), 4);
        assert_eq!(repo.count(&ArticleFilter::published()).await.unwrap(), 3);

        let in_news = ArticleFilter {
            category_id: Some(news),
            ..Default::default()
        };
        assert_eq!(repo.count(&in_news).await.unwrap(), 3);

        let search = ArticleFilter {
            query: Some("go".to_string()),
            ..Default::default()
        };
        let found = repo.list(&search, 0, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "draft");

        let page = repo.list(&ArticleFilter::published(), 0, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        let rest = repo.list(&ArticleFilter::published(), 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_tag() {
        let (pool, repo) = setup_test_repo().await;
        let tagged = repo.create(&CreateArticleInput::new("tagged", "T", "")).await.unwrap();
        repo.create(&CreateArticleInput::new("plain", "P", "")).await.unwrap();

        let db = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO tags (slug, name) VALUES ('rust', 'Rust')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, 1)")
            .bind(tagged.id)
            .execute(db)
            .await
            .unwrap();

        let filter = ArticleFilter {
            tag_id: Some(1),
            ..Default::default()
        };
        let list = repo.list(&filter, 0, 10).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, tagged.id);
    }

    #[tokio::test]
    async fn test_update_partial_and_clear() {
        let (pool, repo) = setup_test_repo().await;
        let cat = create_category(&pool, "cat").await;

        let mut input = CreateArticleInput::new("orig", "Original", "old").with_category(cat);
        input.excerpt = Some("summary".to_string());
        let created = repo.create(&input).await.unwrap();

        let update = UpdateArticleInput {
            title: Some("Updated".to_string()),
            excerpt: Some(None),
            category_id: Some(None),
            seo: Some(SeoMeta {
                meta_title: Some("Meta".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = repo.update(created.id, &update).await.unwrap();

        assert_eq!(updated.title, "Updated");
        assert_eq!(updated.slug, "orig");
        assert_eq!(updated.content, "old");
        assert!(updated.excerpt.is_none());
        assert!(updated.category_id.is_none());
        assert_eq!(updated.seo.meta_title.as_deref(), Some("Meta"));
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_article_fails() {
        let (_pool, repo) = setup_test_repo().await;
        let update = UpdateArticleInput {
            title: Some("x".to_string()),
            ..Default::default()
        };
        assert!(repo.update(42, &update).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&CreateArticleInput::new("gone", "Gone", "")).await.unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_by_slug_excluding() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&CreateArticleInput::new("slug-1", "A", "")).await.unwrap();
        let b = repo.create(&CreateArticleInput::new("slug-2", "B", "")).await.unwrap();

        assert!(repo.exists_by_slug("slug-1", None).await.unwrap());
        assert!(repo.exists_by_slug("slug-1", Some(b.id)).await.unwrap());
        assert!(!repo.exists_by_slug("slug-1", Some(a.id)).await.unwrap());
        assert!(!repo.exists_by_slug("missing", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_views() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&CreateArticleInput::new("v", "V", "")).await.unwrap();
        repo.increment_views(a.id).await.unwrap();
        repo.increment_views(a.id).await.unwrap();
        assert_eq!(repo.get_by_id(a.id).await.unwrap().unwrap().view_count, 2);
    }
}
