//! Tag repository
//!
//! Tags and the `article_tags` link table.

use crate::db::{on_backend, Backend, DynDatabasePool};
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, slug: &str, name: &str) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Get tag by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// All tags with article counts, most used first then by name.
    ///
    /// With `published_only` only published articles are counted.
    async fn list_with_counts(&self, published_only: bool) -> Result<Vec<TagWithCount>>;

    /// Rename a tag
    async fn update(&self, id: i64, slug: &str, name: &str) -> Result<Tag>;

    /// Delete a tag and its article links
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Tags of an article, ordered by name
    async fn get_by_article(&self, article_id: i64) -> Result<Vec<Tag>>;

    /// Replace the tags of an article
    async fn set_for_article(&self, article_id: i64, tag_ids: &[i64]) -> Result<()>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_one(&self, column: &str, value: TagKey<'_>) -> Result<Option<Tag>> {
        let sql = format!(
            "SELECT id, slug, name, created_at FROM tags WHERE {} = ?",
            column
        );
        let tag: Option<Tag> = on_backend!(self.pool, |p| {
            let query = sqlx::query_as(&sql);
            let query = match value {
                TagKey::Id(id) => query.bind(id),
                TagKey::Text(text) => query.bind(text),
            };
            query
                .fetch_optional(p)
                .await
                .with_context(|| format!("Failed to get tag by {}", column))?
        });
        Ok(tag)
    }
}

#[derive(Clone, Copy)]
enum TagKey<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, slug: &str, name: &str) -> Result<Tag> {
        const SQL: &str = "INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?)";
        let now = Utc::now();

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SQL)
                .bind(slug)
                .bind(name)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create tag")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(SQL)
                .bind(slug)
                .bind(name)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create tag")?
                .last_insert_id() as i64,
        };

        self.get_by_id(id).await?.context("Tag not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        self.get_one("id", TagKey::Id(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        self.get_one("slug", TagKey::Text(slug)).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        self.get_one("name", TagKey::Text(name)).await
    }

    async fn list_with_counts(&self, published_only: bool) -> Result<Vec<TagWithCount>> {
        let article_join = if published_only {
            "LEFT JOIN articles a ON a.id = link.article_id AND a.status = 'published'"
        } else {
            "LEFT JOIN articles a ON a.id = link.article_id"
        };
        let sql = format!(
            "SELECT t.id, t.slug, t.name, t.created_at, COUNT(a.id) AS article_count \
             FROM tags t \
             LEFT JOIN article_tags link ON link.tag_id = t.id \
             {} \
             GROUP BY t.id, t.slug, t.name, t.created_at \
             ORDER BY article_count DESC, t.name ASC",
            article_join
        );
        let tags: Vec<TagWithCount> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list tags with counts")?
        });
        Ok(tags)
    }

    async fn update(&self, id: i64, slug: &str, name: &str) -> Result<Tag> {
        on_backend!(self.pool, |p| {
            sqlx::query("UPDATE tags SET slug = ?, name = ? WHERE id = ?")
                .bind(slug)
                .bind(name)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update tag")?;
        });
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Tag {} not found", id))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete tag")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn get_by_article(&self, article_id: i64) -> Result<Vec<Tag>> {
        let tags: Vec<Tag> = on_backend!(self.pool, |p| {
            sqlx::query_as(
                "SELECT t.id, t.slug, t.name, t.created_at FROM tags t \
                 INNER JOIN article_tags link ON link.tag_id = t.id \
                 WHERE link.article_id = ? ORDER BY t.name",
            )
            .bind(article_id)
            .fetch_all(p)
            .await
            .context("Failed to get article tags")?
        });
        Ok(tags)
    }

    async fn set_for_article(&self, article_id: i64, tag_ids: &[i64]) -> Result<()> {
        let mut ids = tag_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        on_backend!(self.pool, |p| {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                .bind(article_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear article tags")?;
            for tag_id in &ids {
                sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                    .bind(article_id)
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to link tag to article")?;
            }
            tx.commit().await.context("Failed to commit article tags")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ArticleRepository, SqlxArticleRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ArticleStatus, CreateArticleInput};

    async fn setup() -> (SqlxTagRepository, SqlxArticleRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (
            SqlxTagRepository::new(pool.clone()),
            SqlxArticleRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (tags, _) = setup().await;
        let rust = tags.create("rust", "Rust").await.unwrap();

        assert_eq!(tags.get_by_id(rust.id).await.unwrap(), Some(rust.clone()));
        assert_eq!(tags.get_by_slug("rust").await.unwrap(), Some(rust.clone()));
        assert_eq!(tags.get_by_name("Rust").await.unwrap(), Some(rust));
        assert!(tags.get_by_name("Go").await.unwrap().is_none());
        assert!(tags.create("rust-2", "Rust").await.is_err());
    }

    #[tokio::test]
    async fn test_set_and_get_article_tags() {
        let (tags, articles) = setup().await;
        let article = articles
            .create(&CreateArticleInput::new("a", "A", ""))
            .await
            .unwrap();
        let web = tags.create("web", "Web").await.unwrap();
        let async_tag = tags.create("async", "Async").await.unwrap();
        let db = tags.create("db", "Databases").await.unwrap();

        tags.set_for_article(article.id, &[web.id, async_tag.id, web.id])
            .await
            .unwrap();
        let names: Vec<String> = tags
            .get_by_article(article.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Async", "Web"]);

        tags.set_for_article(article.id, &[db.id]).await.unwrap();
        let tagged = tags.get_by_article(article.id).await.unwrap();
        assert_eq!(tagged, vec![db]);
    }

    #[tokio::test]
    async fn test_list_with_counts() {
        let (tags, articles) = setup().await;
        let popular = tags.create("popular", "Popular").await.unwrap();
        let rare = tags.create("rare", "Rare").await.unwrap();
        tags.create("unused", "Unused").await.unwrap();

        let published = articles
            .create(&CreateArticleInput::new("p", "P", "").with_status(ArticleStatus::Published))
            .await
            .unwrap();
        let draft = articles
            .create(&CreateArticleInput::new("d", "D", ""))
            .await
            .unwrap();
        tags.set_for_article(published.id, &[popular.id]).await.unwrap();
        tags.set_for_article(draft.id, &[popular.id, rare.id]).await.unwrap();

        let all = tags.list_with_counts(false).await.unwrap();
        let counts: Vec<(String, i64)> = all
            .iter()
            .map(|t| (t.tag.slug.clone(), t.article_count))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("popular".to_string(), 2),
                ("rare".to_string(), 1),
                ("unused".to_string(), 0)
            ]
        );

        let public = tags.list_with_counts(true).await.unwrap();
        assert_eq!(public[0].tag.slug, "popular");
        assert_eq!(public[0].article_count, 1);
        assert!(public[1..].iter().all(|t| t.article_count == 0));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (tags, articles) = setup().await;
        let tag = tags.create("old", "Old").await.unwrap();
        let article = articles
            .create(&CreateArticleInput::new("a", "A", ""))
            .await
            .unwrap();
        tags.set_for_article(article.id, &[tag.id]).await.unwrap();

        let renamed = tags.update(tag.id, "new", "New").await.unwrap();
        assert_eq!(renamed.slug, "new");
        assert_eq!(renamed.name, "New");

        assert!(tags.delete(tag.id).await.unwrap());
        assert!(tags.get_by_article(article.id).await.unwrap().is_empty());
        assert!(!tags.delete(tag.id).await.unwrap());
    }
}
