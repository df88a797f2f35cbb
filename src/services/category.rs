//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories
//! - Hierarchical category tree
//! - Slug generation from name
//! - Cycle prevention when re-parenting

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{
    double_option, Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput,
};
use crate::services::sitemap::invalidate_feeds;
use crate::services::slug::{is_valid_slug, slugify};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

/// Maximum category name length in characters
pub const MAX_CATEGORY_NAME_LENGTH: usize = 100;

/// Cache key prefixes
const CACHE_KEY_CATEGORY_LIST: &str = "category:list";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category slug already exists
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    /// Category not found
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Parent category not found
    #[error("Parent category not found: {0}")]
    ParentNotFound(i64),

    /// Circular reference detected
    #[error("Circular reference detected: category cannot be its own ancestor")]
    CircularReference,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category as submitted by an editor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i32,
}

impl CategoryInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Partial category update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    /// `Some(None)` moves the category to the top level
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Category service for managing blog categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` for a blank or over-long name or a malformed slug
    /// - `DuplicateSlug` if the slug is taken
    /// - `ParentNotFound` if the parent doesn't exist
    pub async fn create(&self, input: CategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let slug = resolve_slug(input.slug.as_deref(), name)?;

        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        if let Some(parent_id) = input.parent_id {
            self.ensure_parent_exists(parent_id).await?;
        }

        let created = self
            .repo
            .create(&CreateCategoryInput {
                slug,
                name: name.to_string(),
                description: input.description.filter(|d| !d.trim().is_empty()),
                parent_id: input.parent_id,
                sort_order: input.sort_order,
            })
            .await
            .context("Failed to create category")?;

        tracing::info!("Created category {} ({})", created.id, created.slug);
        self.invalidate_cache().await;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self.list().await?.into_iter().find(|c| c.id == id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self.list().await?.into_iter().find(|c| c.slug == slug))
    }

    /// All categories ordered by sort order, then name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST).await {
            return Ok(cached);
        }

        let categories = self
            .repo
            .list()
            .await
            .context("Failed to list categories")?;

        let _ = self
            .cache
            .set(CACHE_KEY_CATEGORY_LIST, &categories, self.cache.default_ttl())
            .await;
        Ok(categories)
    }

    /// Categories nested under their parents
    pub async fn tree(&self) -> Result<Vec<CategoryTree>, CategoryServiceError> {
        Ok(CategoryTree::build(&self.list().await?))
    }

    /// Update a category, including moving it under a new parent
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `ParentNotFound` if the new parent doesn't exist
    /// - `CircularReference` if the new parent is the category or one of its descendants
    pub async fn update(
        &self,
        id: i64,
        patch: CategoryPatch,
    ) -> Result<Category, CategoryServiceError> {
        let existing = self.get_by_id(id).await?.ok_or_else(|| {
            CategoryServiceError::NotFound(format!("Category with ID {} not found", id))
        })?;

        let name = match patch.name.as_deref() {
            Some(name) => Some(validate_name(name)?.to_string()),
            None => None,
        };

        let slug = match patch.slug.as_deref() {
            Some(slug) => {
                let slug = resolve_slug(Some(slug), name.as_deref().unwrap_or(&existing.name))?;
                if self
                    .repo
                    .exists_by_slug(&slug, Some(id))
                    .await
                    .context("Failed to check slug uniqueness")?
                {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
                Some(slug)
            }
            None => None,
        };

        if let Some(Some(parent_id)) = patch.parent_id {
            self.ensure_parent_exists(parent_id).await?;
            if self.would_create_cycle(id, parent_id).await? {
                return Err(CategoryServiceError::CircularReference);
            }
        }

        let updated = self
            .repo
            .update(
                id,
                &UpdateCategoryInput {
                    slug,
                    name,
                    description: patch
                        .description
                        .map(|d| d.filter(|d| !d.trim().is_empty())),
                    parent_id: patch.parent_id,
                    sort_order: patch.sort_order,
                },
            )
            .await
            .context("Failed to update category")?;

        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a category.
    ///
    /// Its articles become uncategorized and its children move to the top level.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete category")?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(format!(
                "Category with ID {} not found",
                id
            )));
        }

        tracing::info!("Deleted category {}", id);
        self.invalidate_cache().await;
        // Cached articles still carry the old category_id
        let _ = self.cache.delete_pattern("article:*").await;
        Ok(())
    }

    /// Check whether making `new_parent_id` the parent of `category_id`
    /// would put the category inside its own subtree
    async fn would_create_cycle(
        &self,
        category_id: i64,
        new_parent_id: i64,
    ) -> Result<bool, CategoryServiceError> {
        if category_id == new_parent_id {
            return Ok(true);
        }

        let categories = self.list().await?;
        let mut current = Some(new_parent_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == category_id {
                return Ok(true);
            }
            steps += 1;
            if steps > categories.len() {
                // Existing data already contains a loop
                return Ok(true);
            }
            current = categories
                .iter()
                .find(|c| c.id == id)
                .and_then(|c| c.parent_id);
        }
        Ok(false)
    }

    async fn ensure_parent_exists(&self, parent_id: i64) -> Result<(), CategoryServiceError> {
        if self.get_by_id(parent_id).await?.is_none() {
            return Err(CategoryServiceError::ParentNotFound(parent_id));
        }
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("category:*").await;
        invalidate_feeds(&self.cache).await;
    }
}

fn validate_name(name: &str) -> Result<&str, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_CATEGORY_NAME_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name cannot exceed {} characters",
            MAX_CATEGORY_NAME_LENGTH
        )));
    }
    Ok(name)
}

fn resolve_slug(slug: Option<&str>, name: &str) -> Result<String, CategoryServiceError> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(slug) => Err(CategoryServiceError::ValidationError(format!(
            "Invalid slug: {}",
            slug
        ))),
        None => match slugify(name) {
            s if s.is_empty() => Err(CategoryServiceError::ValidationError(
                "Cannot generate a slug from the category name".to_string(),
            )),
            s => Ok(s),
        },
    }
}
