//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{on_backend, Backend, DynDatabasePool};
use crate::models::{Comment, CommentStatus, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of one article in posting order, optionally by status
    async fn list_by_article(
        &self,
        article_id: i64,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>>;

    /// All comments, newest first, optionally by status
    async fn list(&self, status: Option<CommentStatus>, offset: i64, limit: i64)
        -> Result<Vec<Comment>>;

    /// Count comments, optionally by status
    async fn count(&self, status: Option<CommentStatus>) -> Result<i64>;

    /// Update comment status. Returns false if the comment does not exist.
    async fn update_status(&self, id: i64, status: CommentStatus) -> Result<bool>;

    /// Delete a comment and its replies
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_COLUMNS: &str =
    "id, article_id, parent_id, author_name, author_email, author_url, content, status, created_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    article_id: i64,
    parent_id: Option<i64>,
    author_name: String,
    author_email: String,
    author_url: Option<String>,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = anyhow::Error;

    fn try_from(row: CommentRow) -> Result<Self> {
        Ok(Comment {
            status: row.status.parse().map_err(anyhow::Error::msg)?,
            id: row.id,
            article_id: row.article_id,
            parent_id: row.parent_id,
            author_name: row.author_name,
            author_email: row.author_email,
            author_url: row.author_url,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

/// Extra WHERE condition for an optional status filter
fn status_condition(status: Option<CommentStatus>) -> &'static str {
    if status.is_some() {
        " AND status = ?"
    } else {
        ""
    }
}

/// Bind the status filter if one was given
macro_rules! bind_status {
    ($query:expr, $status:expr) => {{
        let query = $query;
        match $status {
            Some(status) => query.bind(status.as_str()),
            None => query,
        }
    }};
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        const SQL: &str = "INSERT INTO comments (article_id, parent_id, author_name, author_email, \
             author_url, content, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

        macro_rules! insert {
            ($p:expr) => {
                sqlx::query(SQL)
                    .bind(input.article_id)
                    .bind(input.parent_id)
                    .bind(&input.author_name)
                    .bind(&input.author_email)
                    .bind(&input.author_url)
                    .bind(&input.content)
                    .bind(input.status.as_str())
                    .bind(Utc::now())
                    .execute($p)
                    .await
                    .context("Failed to create comment")?
            };
        }

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => insert!(p).last_insert_rowid(),
            Backend::Mysql(p) => insert!(p).last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .context("Comment not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        let row: Option<CommentRow> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get comment")?
        });
        row.map(Comment::try_from).transpose()
    }

    async fn list_by_article(
        &self,
        article_id: i64,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE article_id = ?{} ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS,
            status_condition(status)
        );
        let rows: Vec<CommentRow> = on_backend!(self.pool, |p| {
            bind_status!(sqlx::query_as(&sql).bind(article_id), status)
                .fetch_all(p)
                .await
                .context("Failed to list article comments")?
        });
        rows.into_iter().map(Comment::try_from).collect()
    }

    async fn list(
        &self,
        status: Option<CommentStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE 1 = 1{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            COMMENT_COLUMNS,
            status_condition(status)
        );
        let rows: Vec<CommentRow> = on_backend!(self.pool, |p| {
            bind_status!(sqlx::query_as(&sql), status)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list comments")?
        });
        rows.into_iter().map(Comment::try_from).collect()
    }

    async fn count(&self, status: Option<CommentStatus>) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM comments WHERE 1 = 1{}",
            status_condition(status)
        );
        let count: i64 = on_backend!(self.pool, |p| {
            bind_status!(sqlx::query_scalar(&sql), status)
                .fetch_one(p)
                .await
                .context("Failed to count comments")?
        });
        Ok(count)
    }

    async fn update_status(&self, id: i64, status: CommentStatus) -> Result<bool> {
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("UPDATE comments SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update comment status")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete comment")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ArticleRepository, SqlxArticleRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateArticleInput;

    async fn setup() -> (SqlxCommentRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&CreateArticleInput::new("post", "Post", "body"))
            .await
            .unwrap();
        (SqlxCommentRepository::new(pool), article.id)
    }

    fn input(article_id: i64, parent_id: Option<i64>, status: CommentStatus) -> CreateCommentInput {
        CreateCommentInput {
            article_id,
            parent_id,
            author_name: "Reader".to_string(),
            author_email: "reader@example.com".to_string(),
            author_url: None,
            content: "Nice post".to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, article_id) = setup().await;
        let created = repo
            .create(&input(article_id, None, CommentStatus::Pending))
            .await
            .unwrap();

        assert_eq!(created.article_id, article_id);
        assert_eq!(created.status, CommentStatus::Pending);
        assert_eq!(created.author_email, "reader@example.com");
        assert_eq!(repo.get_by_id(created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_list_by_article_filters_status() {
        let (repo, article_id) = setup().await;
        let first = repo
            .create(&input(article_id, None, CommentStatus::Approved))
            .await
            .unwrap();
        repo.create(&input(article_id, Some(first.id), CommentStatus::Approved))
            .await
            .unwrap();
        repo.create(&input(article_id, None, CommentStatus::Spam))
            .await
            .unwrap();

        let approved = repo
            .list_by_article(article_id, Some(CommentStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 2);
        assert_eq!(approved[0].id, first.id);

        let all = repo.list_by_article(article_id, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let (repo, article_id) = setup().await;
        for _ in 0..3 {
            repo.create(&input(article_id, None, CommentStatus::Pending))
                .await
                .unwrap();
        }
        repo.create(&input(article_id, None, CommentStatus::Approved))
            .await
            .unwrap();

        assert_eq!(repo.count(None).await.unwrap(), 4);
        assert_eq!(repo.count(Some(CommentStatus::Pending)).await.unwrap(), 3);

        let page = repo.list(Some(CommentStatus::Pending), 0, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].id > page[1].id);
    }

    #[tokio::test]
    async fn test_update_status() {
        let (repo, article_id) = setup().await;
        let c = repo
            .create(&input(article_id, None, CommentStatus::Pending))
            .await
            .unwrap();

        assert!(repo.update_status(c.id, CommentStatus::Approved).await.unwrap());
        assert!(!repo.update_status(999, CommentStatus::Approved).await.unwrap());
        assert_eq!(
            repo.get_by_id(c.id).await.unwrap().unwrap().status,
            CommentStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_delete_removes_replies() {
        let (repo, article_id) = setup().await;
        let parent = repo
            .create(&input(article_id, None, CommentStatus::Approved))
            .await
            .unwrap();
        let reply = repo
            .create(&input(article_id, Some(parent.id), CommentStatus::Approved))
            .await
            .unwrap();

        assert!(repo.delete(parent.id).await.unwrap());
        assert!(repo.get_by_id(reply.id).await.unwrap().is_none());
    }
}
