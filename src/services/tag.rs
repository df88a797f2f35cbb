//! Tag service
//!
//! Implements business logic for tag management:
//! - Create, rename and delete tags
//! - Reuse an existing tag by name when tagging articles
//! - Tag cloud ordered by usage

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use crate::services::sitemap::invalidate_feeds;
use crate::services::slug::{is_valid_slug, slugify};
use anyhow::Context;
use std::sync::Arc;

/// Maximum tag name length in characters
pub const MAX_TAG_NAME_LENGTH: usize = 50;

const CACHE_KEY_TAG_LIST: &str = "tag:list:";

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Tag name or slug already taken
    #[error("Tag already exists: {0}")]
    DuplicateSlug(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service for managing blog tags
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<Cache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Create a tag.
    ///
    /// The slug is generated from the name when `slug` is `None` or blank.
    ///
    /// # Errors
    /// - `ValidationError` if the name is blank, too long, or the slug is malformed
    /// - `DuplicateSlug` if the name or slug is already used
    pub async fn create(&self, name: &str, slug: Option<&str>) -> Result<Tag, TagServiceError> {
        let name = validate_name(name)?;
        let slug = resolve_slug(name, slug)?;

        self.ensure_available(name, &slug, None).await?;

        let tag = self
            .repo
            .create(&slug, name)
            .await
            .context("Failed to create tag")?;

        tracing::info!("Created tag {} ({})", tag.name, tag.slug);
        self.invalidate_cache().await;
        Ok(tag)
    }

    /// Return the tag called `name`, creating it if needed.
    ///
    /// A generated slug that collides with another tag gets a numeric suffix.
    pub async fn get_or_create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let name = validate_name(name)?;

        if let Some(existing) = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to look up tag by name")?
        {
            return Ok(existing);
        }

        let base = match slugify(name) {
            s if s.is_empty() => "tag".to_string(),
            s => s,
        };
        let mut slug = base.clone();
        let mut suffix = 2;
        while self
            .repo
            .get_by_slug(&slug)
            .await
            .context("Failed to check tag slug")?
            .is_some()
        {
            slug = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        let tag = self
            .repo
            .create(&slug, name)
            .await
            .context("Failed to create tag")?;
        self.invalidate_cache().await;
        Ok(tag)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Tag>, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag by ID")
            .map_err(Into::into)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>, TagServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get tag by slug")
            .map_err(Into::into)
    }

    /// Tag cloud: every tag with its article count, most used first.
    ///
    /// With `published_only` the counts only include published articles.
    pub async fn list_with_counts(
        &self,
        published_only: bool,
    ) -> Result<Vec<TagWithCount>, TagServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_TAG_LIST, published_only);
        if let Ok(Some(cached)) = self.cache.get::<Vec<TagWithCount>>(&cache_key).await {
            return Ok(cached);
        }

        let tags = self
            .repo
            .list_with_counts(published_only)
            .await
            .context("Failed to list tags")?;

        let _ = self
            .cache
            .set(&cache_key, &tags, self.cache.default_ttl())
            .await;
        Ok(tags)
    }

    /// Rename and/or re-slug a tag
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> Result<Tag, TagServiceError> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| TagServiceError::NotFound(format!("Tag with ID {} not found", id)))?;

        let name = match name {
            Some(name) => validate_name(name)?,
            None => existing.name.as_str(),
        };
        let slug = match slug {
            Some(slug) => resolve_slug(name, Some(slug))?,
            None => existing.slug.clone(),
        };

        self.ensure_available(name, &slug, Some(id)).await?;

        let tag = self
            .repo
            .update(id, &slug, name)
            .await
            .context("Failed to update tag")?;
        self.invalidate_cache().await;
        Ok(tag)
    }

    /// Delete a tag and its article links
    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete tag")?;
        if !deleted {
            return Err(TagServiceError::NotFound(format!(
                "Tag with ID {} not found",
                id
            )));
        }
        self.invalidate_cache().await;
        Ok(())
    }

    /// Tags attached to an article, by name
    pub async fn get_by_article(&self, article_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        self.repo
            .get_by_article(article_id)
            .await
            .context("Failed to get article tags")
            .map_err(Into::into)
    }

    /// Replace an article's tags with the given names, creating missing tags.
    ///
    /// Blank names are skipped and repeated names collapse to one link.
    pub async fn set_for_article(
        &self,
        article_id: i64,
        names: &[String],
    ) -> Result<Vec<Tag>, TagServiceError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            let tag = self.get_or_create(name).await?;
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }

        self.repo
            .set_for_article(article_id, &ids)
            .await
            .context("Failed to set article tags")?;
        self.invalidate_cache().await;

        self.get_by_article(article_id).await
    }

    /// Drop cached tag clouds and crawler documents; called whenever tag links may have changed
    pub async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("tag:*").await;
        invalidate_feeds(&self.cache).await;
    }

    async fn ensure_available(
        &self,
        name: &str,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), TagServiceError> {
        let by_name = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check tag name")?;
        if by_name.is_some_and(|t| Some(t.id) != exclude_id) {
            return Err(TagServiceError::DuplicateSlug(name.to_string()));
        }

        let by_slug = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to check tag slug")?;
        if by_slug.is_some_and(|t| Some(t.id) != exclude_id) {
            return Err(TagServiceError::DuplicateSlug(slug.to_string()));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<&str, TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::ValidationError(
            "Tag name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(TagServiceError::ValidationError(format!(
            "Tag name cannot exceed {} characters",
            MAX_TAG_NAME_LENGTH
        )));
    }
    Ok(name)
}

fn resolve_slug(name: &str, slug: Option<&str>) -> Result<String, TagServiceError> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(slug) => Err(TagServiceError::ValidationError(format!(
            "Invalid slug: {}",
            slug
        ))),
        None => match slugify(name) {
            s if s.is_empty() => Err(TagServiceError::ValidationError(
                "Cannot generate a slug from the tag name".to_string(),
            )),
            s => Ok(s),
        },
    }
}
