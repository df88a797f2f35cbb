//! Shared API response types
//!
//! Article payloads embed their category and tags so clients don't need a
//! second round trip.

use serde::{Deserialize, Serialize};

use crate::models::{Article, Category, Tag};
use crate::services::markdown::TocEntry;

/// Article with its category and tags
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleResponse {
    #[serde(flatten)]
    pub article: Article,
    pub category: Option<CategoryInfo>,
    pub tags: Vec<TagInfo>,
    /// Only on single-article endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc: Option<Vec<TocEntry>>,
}

/// Category info embedded in article response
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CategoryInfo {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

/// Tag info embedded in article response
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TagInfo {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            article,
            category: None,
            tags: Vec::new(),
            toc: None,
        }
    }
}

impl ArticleResponse {
    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category.map(|c| CategoryInfo {
            id: c.id,
            slug: c.slug,
            name: c.name,
        });
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags
            .into_iter()
            .map(|t| TagInfo {
                id: t.id,
                slug: t.slug,
                name: t.name,
            })
            .collect();
        self
    }

    pub fn with_toc(mut self, toc: Vec<TocEntry>) -> Self {
        self.toc = Some(toc);
        self
    }
}
