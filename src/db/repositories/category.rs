//! Category repository
//!
//! - `CategoryRepository` trait defining category data access
//! - `SqlxCategoryRepository` implementing it for SQLite and MySQL

use crate::db::{on_backend, Backend, DynDatabasePool};
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, input: &CreateCategoryInput) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List all categories ordered by sort_order, then name
    async fn list(&self) -> Result<Vec<Category>>;

    /// Update a category
    async fn update(&self, id: i64, input: &UpdateCategoryInput) -> Result<Category>;

    /// Delete a category. Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a slug is taken, optionally ignoring one category
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const CATEGORY_COLUMNS: &str = "id, slug, name, description, parent_id, sort_order, created_at";

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, input: &CreateCategoryInput) -> Result<Category> {
        const SQL: &str = "INSERT INTO categories (slug, name, description, parent_id, sort_order, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)";

        macro_rules! insert {
            ($p:expr) => {
                sqlx::query(SQL)
                    .bind(&input.slug)
                    .bind(&input.name)
                    .bind(&input.description)
                    .bind(input.parent_id)
                    .bind(input.sort_order)
                    .bind(Utc::now())
                    .execute($p)
                    .await
                    .context("Failed to create category")?
            };
        }

        let id = match self.pool.backend() {
            Backend::Sqlite(p) => insert!(p).last_insert_rowid(),
            Backend::Mysql(p) => insert!(p).last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .context("Category not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        let category: Option<Category> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get category by id")?
        });
        Ok(category)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE slug = ?", CATEGORY_COLUMNS);
        let category: Option<Category> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get category by slug")?
        });
        Ok(category)
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories ORDER BY sort_order, name",
            CATEGORY_COLUMNS
        );
        let categories: Vec<Category> = on_backend!(self.pool, |p| {
            sqlx::query_as(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list categories")?
        });
        Ok(categories)
    }

    async fn update(&self, id: i64, input: &UpdateCategoryInput) -> Result<Category> {
        let existing = self
            .get_by_id(id)
            .await?
            .with_context(|| format!("Category {} not found", id))?;

        let slug = input.slug.as_ref().unwrap_or(&existing.slug);
        let name = input.name.as_ref().unwrap_or(&existing.name);
        let description = input
            .description
            .clone()
            .unwrap_or(existing.description.clone());
        let parent_id = input.parent_id.unwrap_or(existing.parent_id);
        let sort_order = input.sort_order.unwrap_or(existing.sort_order);

        on_backend!(self.pool, |p| {
            sqlx::query(
                "UPDATE categories SET slug = ?, name = ?, description = ?, parent_id = ?, sort_order = ? WHERE id = ?",
            )
            .bind(slug)
            .bind(name)
            .bind(&description)
            .bind(parent_id)
            .bind(sort_order)
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update category")?;
        });

        self.get_by_id(id)
            .await?
            .context("Category not found after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // Articles and child categories are detached by ON DELETE SET NULL
        let affected = on_backend!(self.pool, |p| {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = on_backend!(self.pool, |p| {
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(p)
                .await
                .context("Failed to check category slug")?
        });
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    fn input(slug: &str, parent_id: Option<i64>, sort_order: i32) -> CreateCategoryInput {
        CreateCategoryInput {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            description: None,
            parent_id,
            sort_order,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;

        let mut create = input("tech", None, 0);
        create.description = Some("Technology".to_string());
        let created = repo.create(&create).await.unwrap();

        assert_eq!(created.slug, "tech");
        assert_eq!(created.name, "TECH");
        assert_eq!(created.description.as_deref(), Some("Technology"));

        let by_slug = repo.get_by_slug("tech").await.unwrap().unwrap();
        assert_eq!(by_slug, created);
        assert!(repo.get_by_id(123).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ordering() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&input("zeta", None, 0)).await.unwrap();
        repo.create(&input("alpha", None, 0)).await.unwrap();
        repo.create(&input("first", None, -1)).await.unwrap();

        let slugs: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.slug).collect();
        assert_eq!(slugs, vec!["first", "alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_update_moves_parent() {
        let (_pool, repo) = setup_test_repo().await;
        let parent = repo.create(&input("parent", None, 0)).await.unwrap();
        let child = repo.create(&input("child", None, 0)).await.unwrap();

        let moved = repo
            .update(
                child.id,
                &UpdateCategoryInput {
                    parent_id: Some(Some(parent.id)),
                    name: Some("Child".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(parent.id));
        assert_eq!(moved.name, "Child");
        assert_eq!(moved.slug, "child");

        let detached = repo
            .update(
                child.id,
                &UpdateCategoryInput {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(detached.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_detaches_children() {
        let (_pool, repo) = setup_test_repo().await;
        let parent = repo.create(&input("parent", None, 0)).await.unwrap();
        let child = repo.create(&input("child", Some(parent.id), 0)).await.unwrap();

        assert!(repo.delete(parent.id).await.unwrap());
        assert!(!repo.delete(parent.id).await.unwrap());

        let child = repo.get_by_id(child.id).await.unwrap().unwrap();
        assert!(child.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_exists_by_slug() {
        let (_pool, repo) = setup_test_repo().await;
        let c = repo.create(&input("news", None, 0)).await.unwrap();

        assert!(repo.exists_by_slug("news", None).await.unwrap());
        assert!(!repo.exists_by_slug("news", Some(c.id)).await.unwrap());
        assert!(!repo.exists_by_slug("other", None).await.unwrap());
    }
}
