//! Settings repository
//!
//! Key/value site settings. `key` is backquoted in SQL, which both SQLite
//! and MySQL accept.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{on_backend, Backend, DynDatabasePool};

/// A setting key-value pair
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Get a single setting by key
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    /// Get all settings, ordered by key
    async fn get_all(&self) -> Result<Vec<Setting>>;

    /// Get multiple settings by keys. Missing keys are left out.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// Insert or replace a single setting
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Insert or replace several settings
    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        let setting: Option<Setting> = on_backend!(self.pool, |p| {
            sqlx::query_as("SELECT `key`, value, updated_at FROM settings WHERE `key` = ?")
                .bind(key)
                .fetch_optional(p)
                .await
                .with_context(|| format!("Failed to get setting {}", key))?
        });
        Ok(setting)
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        let settings: Vec<Setting> = on_backend!(self.pool, |p| {
            sqlx::query_as("SELECT `key`, value, updated_at FROM settings ORDER BY `key`")
                .fetch_all(p)
                .await
                .context("Failed to list settings")?
        });
        Ok(settings)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut result = HashMap::new();
        for key in keys {
            if let Some(setting) = self.get(key).await? {
                result.insert(setting.key, setting.value);
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now();
        let context = || format!("Failed to set setting {}", key);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(
                    "INSERT INTO settings (`key`, value, updated_at) VALUES (?, ?, ?)
                     ON CONFLICT(`key`) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(p)
                .await
                .with_context(context)?;
            }
            Backend::Mysql(p) => {
                sqlx::query(
                    "INSERT INTO settings (`key`, value, updated_at) VALUES (?, ?, ?)
                     ON DUPLICATE KEY UPDATE value = VALUES(value), updated_at = VALUES(updated_at)",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(p)
                .await
                .with_context(context)?;
            }
        }
        Ok(())
    }

    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()> {
        for (key, value) in settings {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        on_backend!(self.pool, |p| {
            sqlx::query("DELETE FROM settings WHERE `key` = ?")
                .bind(key)
                .execute(p)
                .await
                .with_context(|| format!("Failed to delete setting {}", key))?;
        });
        Ok(())
    }
}
