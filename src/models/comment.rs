//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment moderation status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Spam,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Spam => "spam",
        }
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "spam" => Ok(Self::Spam),
            _ => Err(format!("Invalid comment status: {}", s)),
        }
    }
}

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    /// Never exposed on public endpoints
    #[serde(skip_serializing)]
    pub author_email: String,
    pub author_url: Option<String>,
    pub content: String,
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
}

/// Comment with its replies, for threaded display
#[derive(Debug, Clone, Serialize)]
pub struct CommentTree {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentTree>,
}

impl CommentTree {
    /// Nest a flat list of comments by `parent_id`.
    ///
    /// Input order is kept among siblings. Replies whose parent is not in the
    /// list (e.g. filtered out by status) are dropped with it.
    pub fn build(comments: Vec<Comment>) -> Vec<CommentTree> {
        let (roots, replies): (Vec<_>, Vec<_>) =
            comments.into_iter().partition(|c| c.parent_id.is_none());
        roots
            .into_iter()
            .map(|root| Self::attach(root, &replies))
            .collect()
    }

    fn attach(comment: Comment, pool: &[Comment]) -> CommentTree {
        let replies = pool
            .iter()
            .filter(|c| c.parent_id == Some(comment.id))
            .cloned()
            .map(|c| Self::attach(c, pool))
            .collect();
        CommentTree { comment, replies }
    }

    /// Number of comments in this thread, including the root
    pub fn len(&self) -> usize {
        1 + self.replies.iter().map(CommentTree::len).sum::<usize>()
    }
}

/// Input for inserting a comment row
#[derive(Debug, Clone)]
pub struct CreateCommentInput {
    pub article_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub author_url: Option<String>,
    pub content: String,
    pub status: CommentStatus,
}
