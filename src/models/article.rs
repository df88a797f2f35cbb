//! Article model
//!
//! This module provides:
//! - `Article` entity with its embedded `SeoMeta`
//! - `ArticleStatus` enum for publication states
//! - Input and filter types for article queries
//! - Pagination types shared by every list endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    /// Article title
    pub title: String,
    /// Short summary, also used as the fallback meta description
    pub excerpt: Option<String>,
    /// Markdown content
    pub content: String,
    /// Rendered HTML content
    pub content_html: String,
    /// Category ID
    pub category_id: Option<i64>,
    /// Publication status
    pub status: ArticleStatus,
    /// Featured image URL
    pub featured_image: Option<String>,
    /// Search engine metadata
    pub seo: SeoMeta,
    /// Last computed SEO score (0-100)
    pub seo_score: i32,
    /// View count
    #[serde(default)]
    pub view_count: i64,
    /// Publication timestamp, set on first publish
    pub published_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Whether the article is visible on the public site
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    /// Title used in `<title>` and `og:title`
    pub fn display_title(&self) -> &str {
        non_blank(self.seo.meta_title.as_deref()).unwrap_or(&self.title)
    }

    /// Description used in the description meta tag, if any
    pub fn display_description(&self) -> Option<&str> {
        non_blank(self.seo.meta_description.as_deref()).or_else(|| non_blank(self.excerpt.as_deref()))
    }

    /// Public path of the article page
    pub fn path(&self) -> String {
        format!("/posts/{}", self.slug)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Search engine metadata attached to an article.
///
/// Every field is optional; renderers fall back to the article's own
/// title, excerpt and URL when a field is blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMeta {
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    /// Comma-separated keywords
    #[serde(default)]
    pub meta_keywords: Option<String>,
    /// Phrase the article is optimised for
    #[serde(default)]
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub og_image: Option<String>,
    /// Ask search engines not to index the page
    #[serde(default)]
    pub noindex: bool,
}

/// Article publication status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Draft - not visible to public
    #[default]
    Draft,
    /// Published - visible to public
    Published,
    /// Archived - hidden but not deleted
    Archived,
}

impl ArticleStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ArticleStatus::Draft),
            "published" => Ok(ArticleStatus::Published),
            "archived" => Ok(ArticleStatus::Archived),
            _ => Err(format!("Invalid article status: {}", s)),
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fully resolved input for inserting an article row
#[derive(Debug, Clone)]
pub struct CreateArticleInput {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub content_html: String,
    pub category_id: Option<i64>,
    pub status: ArticleStatus,
    pub featured_image: Option<String>,
    pub seo: SeoMeta,
    pub seo_score: i32,
}

impl CreateArticleInput {
    /// Minimal draft input, mostly for tests and seeding
    pub fn new(slug: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            excerpt: None,
            content: content.into(),
            content_html: String::new(),
            category_id: None,
            status: ArticleStatus::Draft,
            featured_image: None,
            seo: SeoMeta::default(),
            seo_score: 0,
        }
    }

    /// Set the status
    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the category
    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Partial update of an article row.
///
/// `Option<Option<T>>` fields distinguish "leave unchanged" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct UpdateArticleInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    pub content_html: Option<String>,
    pub category_id: Option<Option<i64>>,
    pub status: Option<ArticleStatus>,
    pub featured_image: Option<Option<String>>,
    pub seo: Option<SeoMeta>,
    pub seo_score: Option<i32>,
    /// Publication timestamp to record when the article goes live
    pub published_at: Option<DateTime<Utc>>,
}

impl UpdateArticleInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.slug.is_some()
            || self.title.is_some()
            || self.excerpt.is_some()
            || self.content.is_some()
            || self.content_html.is_some()
            || self.category_id.is_some()
            || self.status.is_some()
            || self.featured_image.is_some()
            || self.seo.is_some()
            || self.seo_score.is_some()
            || self.published_at.is_some()
    }
}

/// Filters for article listings; all conditions are combined with AND
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    /// Substring matched against title and content
    pub query: Option<String>,
}

impl ArticleFilter {
    /// Published articles only
    pub fn published() -> Self {
        Self {
            status: Some(ArticleStatus::Published),
            ..Self::default()
        }
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamping to valid ranges
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        let per_page = i64::from(self.per_page);
        ((self.total + per_page - 1) / per_page) as u32
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there is a previous page
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Transform the items, keeping pagination metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
