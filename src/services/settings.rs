//! Settings service
//!
//! Key/value site settings with a typed `SiteSettings` view. Known keys are
//! validated; any other key is stored verbatim.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::SettingsRepository;
use crate::services::sitemap::invalidate_feeds;

/// Known setting keys
pub mod keys {
    pub const SITE_NAME: &str = "site_name";
    pub const SITE_DESCRIPTION: &str = "site_description";
    pub const SITE_URL: &str = "site_url";
    pub const POSTS_PER_PAGE: &str = "posts_per_page";
    pub const COMMENT_MODERATION: &str = "comment_moderation";
}

const MAX_KEY_LENGTH: usize = 100;
const CACHE_KEY_SITE_SETTINGS: &str = "settings:site";

/// Site settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: String,
    /// Public base URL; empty means "use the configured default"
    pub site_url: String,
    pub posts_per_page: u32,
    /// Hold new comments for approval
    pub comment_moderation: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Inkpress".to_string(),
            site_description: String::new(),
            site_url: String::new(),
            posts_per_page: 10,
            comment_moderation: true,
        }
    }
}

/// Settings service errors
#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Settings service for managing site configuration
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    cache: Arc<Cache>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Typed site settings, falling back to defaults for missing or
    /// unparseable values
    pub async fn get_site_settings(&self) -> Result<SiteSettings, SettingsServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<SiteSettings>(CACHE_KEY_SITE_SETTINGS).await {
            return Ok(cached);
        }

        let settings = self
            .repo
            .get_many(&[
                keys::SITE_NAME,
                keys::SITE_DESCRIPTION,
                keys::SITE_URL,
                keys::POSTS_PER_PAGE,
                keys::COMMENT_MODERATION,
            ])
            .await
            .context("Failed to load site settings")?;

        let defaults = SiteSettings::default();
        let site = SiteSettings {
            site_name: settings
                .get(keys::SITE_NAME)
                .cloned()
                .unwrap_or(defaults.site_name),
            site_description: settings
                .get(keys::SITE_DESCRIPTION)
                .cloned()
                .unwrap_or(defaults.site_description),
            site_url: settings
                .get(keys::SITE_URL)
                .cloned()
                .unwrap_or(defaults.site_url),
            posts_per_page: settings
                .get(keys::POSTS_PER_PAGE)
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| (1..=100).contains(n))
                .unwrap_or(defaults.posts_per_page),
            comment_moderation: settings
                .get(keys::COMMENT_MODERATION)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.comment_moderation),
        };

        let _ = self
            .cache
            .set(CACHE_KEY_SITE_SETTINGS, &site, self.cache.default_ttl())
            .await;
        Ok(site)
    }

    /// Get a single setting value
    pub async fn get(&self, key: &str) -> Result<Option<String>, SettingsServiceError> {
        let setting = self
            .repo
            .get(key)
            .await
            .context("Failed to load setting")?;
        Ok(setting.map(|s| s.value))
    }

    /// Every stored setting, sorted by key
    pub async fn get_all(&self) -> Result<BTreeMap<String, String>, SettingsServiceError> {
        let settings = self
            .repo
            .get_all()
            .await
            .context("Failed to load settings")?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// Set a single setting value
    pub async fn set(&self, key: &str, value: &str) -> Result<(), SettingsServiceError> {
        let value = validate(key, value)?;
        self.repo
            .set(key, &value)
            .await
            .context("Failed to save setting")?;
        self.invalidate_cache().await;
        Ok(())
    }

    /// Set several settings at once; nothing is written if any value is invalid
    pub async fn set_many(
        &self,
        settings: &HashMap<String, String>,
    ) -> Result<(), SettingsServiceError> {
        let normalized = settings
            .iter()
            .map(|(key, value)| Ok((key.clone(), validate(key, value)?)))
            .collect::<Result<HashMap<_, _>, SettingsServiceError>>()?;

        self.repo
            .set_many(&normalized)
            .await
            .context("Failed to save settings")?;
        tracing::info!("Updated {} settings", normalized.len());
        self.invalidate_cache().await;
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("settings:*").await;
        // Site name, description and URL appear in the sitemap and feed
        invalidate_feeds(&self.cache).await;
    }
}

/// Validate a setting and return the value to store
fn validate(key: &str, value: &str) -> Result<String, SettingsServiceError> {
    if key.trim().is_empty() || key.chars().count() > MAX_KEY_LENGTH {
        return Err(SettingsServiceError::ValidationError(format!(
            "Setting key must be 1 to {} characters",
            MAX_KEY_LENGTH
        )));
    }

    match key {
        keys::POSTS_PER_PAGE => match value.trim().parse::<u32>() {
            Ok(n) if (1..=100).contains(&n) => Ok(n.to_string()),
            _ => Err(SettingsServiceError::ValidationError(
                "posts_per_page must be a number between 1 and 100".to_string(),
            )),
        },
        keys::COMMENT_MODERATION => match value.trim() {
            "true" | "false" => Ok(value.trim().to_string()),
            _ => Err(SettingsServiceError::ValidationError(
                "comment_moderation must be true or false".to_string(),
            )),
        },
        keys::SITE_URL => {
            let url = value.trim();
            if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(SettingsServiceError::ValidationError(
                    "site_url must start with http:// or https://".to_string(),
                ))
            }
        }
        _ => Ok(value.to_string()),
    }
}
