//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity.
///
/// Tags cut across categories; an article may carry any number of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Public path of the tag page
    pub fn path(&self) -> String {
        format!("/tags/{}", self.slug)
    }
}

/// Tag with article count for tag clouds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct TagWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub tag: Tag,
    /// Number of articles with this tag
    pub article_count: i64,
}
