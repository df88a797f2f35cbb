//! Comment service
//!
//! Reader comments with threaded replies and moderation. New comments start
//! as `pending` while the `comment_moderation` setting is on.

use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{
    Comment, CommentStatus, CommentTree, CreateCommentInput, ListParams, PagedResult,
};
use crate::services::settings::{SettingsService, SettingsServiceError};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

pub const MAX_AUTHOR_NAME_LENGTH: usize = 50;
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<SettingsServiceError> for CommentServiceError {
    fn from(err: SettingsServiceError) -> Self {
        match err {
            SettingsServiceError::ValidationError(msg) => Self::ValidationError(msg),
            SettingsServiceError::InternalError(err) => Self::InternalError(err),
        }
    }
}

/// Comment as submitted by a reader
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    #[serde(default)]
    pub author_url: Option<String>,
    pub content: String,
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    article_repo: Arc<dyn ArticleRepository>,
    settings: Arc<SettingsService>,
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        article_repo: Arc<dyn ArticleRepository>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            repo,
            article_repo,
            settings,
        }
    }

    /// Add a comment to a published article
    ///
    /// # Errors
    /// - `NotFound` if the article doesn't exist
    /// - `ValidationError` if the article isn't published, a field is
    ///   invalid, or the parent belongs to another article
    pub async fn create(
        &self,
        article_id: i64,
        input: CommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let article = self
            .article_repo
            .get_by_id(article_id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| {
                CommentServiceError::NotFound(format!("Article with ID {} not found", article_id))
            })?;
        if !article.is_published() {
            return Err(CommentServiceError::ValidationError(
                "Comments are only accepted on published articles".to_string(),
            ));
        }

        let author_name = input.author_name.trim();
        let name_len = author_name.chars().count();
        if name_len == 0 || name_len > MAX_AUTHOR_NAME_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Author name must be 1 to {} characters",
                MAX_AUTHOR_NAME_LENGTH
            )));
        }

        let author_email = input.author_email.trim();
        if !is_valid_email(author_email) {
            return Err(CommentServiceError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }

        let author_url = match input.author_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                Some(url.to_string())
            }
            Some(_) => {
                return Err(CommentServiceError::ValidationError(
                    "Author URL must start with http:// or https://".to_string(),
                ))
            }
        };

        let content = input.content.trim();
        let content_len = content.chars().count();
        if content_len == 0 || content_len > MAX_COMMENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment must be 1 to {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .repo
                .get_by_id(parent_id)
                .await
                .context("Failed to get parent comment")?;
            if parent.map_or(true, |p| p.article_id != article_id) {
                return Err(CommentServiceError::ValidationError(format!(
                    "Parent comment {} does not belong to this article",
                    parent_id
                )));
            }
        }

        let status = if self.settings.get_site_settings().await?.comment_moderation {
            CommentStatus::Pending
        } else {
            CommentStatus::Approved
        };

        let comment = self
            .repo
            .create(&CreateCommentInput {
                article_id,
                parent_id: input.parent_id,
                author_name: author_name.to_string(),
                author_email: author_email.to_string(),
                author_url,
                content: content.to_string(),
                status,
            })
            .await
            .context("Failed to create comment")?;

        tracing::info!(
            "New {} comment {} on article {}",
            comment.status,
            comment.id,
            article_id
        );
        Ok(comment)
    }

    /// Approved comments of an article as a reply tree, oldest first
    pub async fn list_for_article(
        &self,
        article_id: i64,
    ) -> Result<Vec<CommentTree>, CommentServiceError> {
        let comments = self
            .repo
            .list_by_article(article_id, Some(CommentStatus::Approved))
            .await
            .context("Failed to list comments")?;
        Ok(CommentTree::build(comments))
    }

    /// Moderation view: all comments newest first, optionally by status
    pub async fn list(
        &self,
        status: Option<CommentStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let comments = self
            .repo
            .list(status, params.offset(), params.limit())
            .await
            .context("Failed to list comments")?;
        let total = self
            .repo
            .count(status)
            .await
            .context("Failed to count comments")?;
        Ok(PagedResult::new(comments, total, params))
    }

    /// Approve, hold or mark a comment as spam
    pub async fn set_status(
        &self,
        id: i64,
        status: CommentStatus,
    ) -> Result<Comment, CommentServiceError> {
        let updated = self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update comment status")?;
        if !updated {
            return Err(CommentServiceError::NotFound(format!(
                "Comment with ID {} not found",
                id
            )));
        }

        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or_else(|| CommentServiceError::NotFound(format!("Comment with ID {} not found", id)))
    }

    /// Delete a comment and its replies
    pub async fn delete(&self, id: i64) -> Result<(), CommentServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(CommentServiceError::NotFound(format!(
                "Comment with ID {} not found",
                id
            )));
        }
        Ok(())
    }

    /// Number of comments awaiting moderation
    pub async fn count_pending(&self) -> Result<i64, CommentServiceError> {
        self.repo
            .count(Some(CommentStatus::Pending))
            .await
            .context("Failed to count pending comments")
            .map_err(Into::into)
    }
}

/// One `@`, a non-empty local part and a dotted domain, no whitespace
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) || email.len() > 255 {
        return false;
    }
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && domain.split('.').all(|label| !label.is_empty())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        SqlxArticleRepository, SqlxCommentRepository, SqlxSettingsRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ArticleStatus, CreateArticleInput};
    use crate::services::settings::keys;

    struct Fixture {
        service: CommentService,
        settings: Arc<SettingsService>,
        published_id: i64,
        draft_id: i64,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let articles = SqlxArticleRepository::boxed(pool.clone());
        let published_id = articles
            .create(&CreateArticleInput::new("live", "Live", "").with_status(ArticleStatus::Published))
            .await
            .unwrap()
            .id;
        let draft_id = articles
            .create(&CreateArticleInput::new("draft", "Draft", ""))
            .await
            .unwrap()
            .id;

        let settings = Arc::new(SettingsService::new(
            SqlxSettingsRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        ));
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool),
            articles,
            settings.clone(),
        );

        Fixture {
            service,
            settings,
            published_id,
            draft_id,
        }
    }

    fn input(content: &str) -> CommentInput {
        CommentInput {
            parent_id: None,
            author_name: "Ann".to_string(),
            author_email: "ann@example.com".to_string(),
            author_url: None,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ann@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ann"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ann@localhost"));
        assert!(!is_valid_email("ann@@example.com"));
        assert!(!is_valid_email("ann@example."));
        assert!(!is_valid_email("a nn@example.com"));
    }

    #[tokio::test]
    async fn test_create_pending_under_moderation() {
        let f = setup_test_service().await;
        let comment = f.service.create(f.published_id, input("Hello")).await.unwrap();
        assert_eq!(comment.status, CommentStatus::Pending);
        assert_eq!(f.service.count_pending().await.unwrap(), 1);
        assert!(f.service.list_for_article(f.published_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_approved_without_moderation() {
        let f = setup_test_service().await;
        f.settings.set(keys::COMMENT_MODERATION, "false").await.unwrap();

        let comment = f.service.create(f.published_id, input("Hello")).await.unwrap();
        assert_eq!(comment.status, CommentStatus::Approved);
    }

    #[tokio::test]
    async fn test_create_rejects_missing_or_unpublished_article() {
        let f = setup_test_service().await;
        assert!(matches!(
            f.service.create(999, input("Hi")).await,
            Err(CommentServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.create(f.draft_id, input("Hi")).await,
            Err(CommentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_field_validation() {
        let f = setup_test_service().await;
        let cases = [
            CommentInput {
                author_name: "  ".to_string(),
                ..input("x")
            },
            CommentInput {
                author_name: "n".repeat(51),
                ..input("x")
            },
            CommentInput {
                author_email: "nope".to_string(),
                ..input("x")
            },
            CommentInput {
                author_url: Some("ftp://example.com".to_string()),
                ..input("x")
            },
            input("   "),
            input(&"c".repeat(2001)),
        ];
        for case in cases {
            assert!(matches!(
                f.service.create(f.published_id, case).await,
                Err(CommentServiceError::ValidationError(_))
            ));
        }

        let ok = CommentInput {
            author_url: Some(" https://ann.dev ".to_string()),
            ..input(&"c".repeat(2000))
        };
        let comment = f.service.create(f.published_id, ok).await.unwrap();
        assert_eq!(comment.author_url.as_deref(), Some("https://ann.dev"));
    }

    #[tokio::test]
    async fn test_replies_form_tree() {
        let f = setup_test_service().await;
        f.settings.set(keys::COMMENT_MODERATION, "false").await.unwrap();

        let root = f.service.create(f.published_id, input("Root")).await.unwrap();
        let reply = CommentInput {
            parent_id: Some(root.id),
            ..input("Reply")
        };
        f.service.create(f.published_id, reply).await.unwrap();

        let tree = f.service.list_for_article(f.published_id).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment.content, "Reply");
    }

    #[tokio::test]
    async fn test_parent_must_belong_to_article() {
        let f = setup_test_service().await;
        let bad = CommentInput {
            parent_id: Some(12345),
            ..input("Orphan")
        };
        assert!(matches!(
            f.service.create(f.published_id, bad).await,
            Err(CommentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_moderation_flow() {
        let f = setup_test_service().await;
        let comment = f.service.create(f.published_id, input("Hello")).await.unwrap();

        let approved = f
            .service
            .set_status(comment.id, CommentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, CommentStatus::Approved);
        assert_eq!(f.service.list_for_article(f.published_id).await.unwrap().len(), 1);

        let page = f
            .service
            .list(Some(CommentStatus::Approved), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        f.service.delete(comment.id).await.unwrap();
        assert!(matches!(
            f.service.delete(comment.id).await,
            Err(CommentServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.set_status(comment.id, CommentStatus::Spam).await,
            Err(CommentServiceError::NotFound(_))
        ));
    }
}
