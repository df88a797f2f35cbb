//! Media repository

use crate::db::{on_backend, Backend, DynDatabasePool};
use crate::models::{CreateMediaInput, Media};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Media repository trait
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Record an uploaded file
    async fn create(&self, input: &CreateMediaInput) -> Result<Media>;

    /// Get media by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Media>>;

    /// List media, newest first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Media>>;

    /// Count all media
    async fn count(&self) -> Result<i64>;

    /// Total size of all files in bytes
    async fn total_size(&self) -> Result<i64>;

    /// Replace the alt text
    async fn update_alt_text(&self, id: i64, alt_text: Option<&str>) -> Result<bool>;

    /// Delete a media row
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based media repository implementation
pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }
}

const MEDIA_COLUMNS: &str = "id, filename, original_name, mime_type, size, alt_text, created_at";

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn create(&self, input: &CreateMediaInput) -> Result<Media> {
        const SQL: &str = "INSERT INTO media (filename, original_name, mime_type, size, alt_text, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)";

        macro_rules! insert {
            ($p:expr) => {
                sqlx::query(SQL)
                    .bind(&input.filename)
                    .bind(&input.original_name)
                    .bind(&input.mime_type)
                    .bind(input.size)
                    .bind(&input.alt_text)
                    .bind(Utc::now())
                    .execute($p)
                    .await
                    .context("Failed to create media record")?
            };
        }

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => insert!(p).last_insert_rowid(),
            Backend::Mysql(p) => insert!(p).last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .context("Media not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Media>> {
        let sql = format!("SELECT {} FROM media WHERE id = ?", MEDIA_COLUMNS);
        let media: Option<Media> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get media")?
        });
        Ok(media)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Media>> {
        let sql = format!(
            "SELECT {} FROM media ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            MEDIA_COLUMNS
        );
        let media: Vec<Media> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list media")?
        });
        Ok(media)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = on_backend!(self.pool, |p| {
            sqlx::query_scalar("SELECT COUNT(*) FROM media")
                .fetch_one(p)
                .await
                .context("Failed to count media")?
        });
        Ok(count)
    }

    async fn total_size(&self) -> Result<i64> {
        // MySQL SUM over BIGINT yields DECIMAL
        let total: Option<i64> = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar("SELECT SUM(size) FROM media")
                .fetch_one(p)
                .await
                .context("Failed to sum media size")?,
            Backend::Mysql(p) => sqlx::query_scalar("SELECT CAST(SUM(size) AS SIGNED) FROM media")
                .fetch_one(p)
                .await
                .context("Failed to sum media size")?,
        };
        Ok(total.unwrap_or(0))
    }

    async fn update_alt_text(&self, id: i64, alt_text: Option<&str>) -> Result<bool> {
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("UPDATE media SET alt_text = ? WHERE id = ?")
                .bind(alt_text)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update media")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("DELETE FROM media WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete media")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxMediaRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxMediaRepository::new(pool)
    }

    fn input(filename: &str, size: i64) -> CreateMediaInput {
        CreateMediaInput {
            filename: filename.to_string(),
            original_name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            size,
            alt_text: None,
        }
    }

    #[tokio::test]
    async fn test_create_list_count() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.total_size().await.unwrap(), 0);

        let first = repo.create(&input("a.png", 100)).await.unwrap();
        let second = repo.create(&input("b.png", 250)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.total_size().await.unwrap(), 350);

        let listed = repo.list(0, 10).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(repo.list(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_filename_fails() {
        let repo = setup_test_repo().await;
        repo.create(&input("same.png", 1)).await.unwrap();
        assert!(repo.create(&input("same.png", 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_alt_text_and_delete() {
        let repo = setup_test_repo().await;
        let media = repo.create(&input("c.png", 1)).await.unwrap();

        assert!(repo.update_alt_text(media.id, Some("A cat")).await.unwrap());
        let updated = repo.get_by_id(media.id).await.unwrap().unwrap();
        assert_eq!(updated.alt_text.as_deref(), Some("A cat"));

        assert!(repo.update_alt_text(media.id, None).await.unwrap());
        assert!(repo.get_by_id(media.id).await.unwrap().unwrap().alt_text.is_none());

        assert!(repo.delete(media.id).await.unwrap());
        assert!(!repo.delete(media.id).await.unwrap());
        assert!(!repo.update_alt_text(media.id, None).await.unwrap());
    }
}
