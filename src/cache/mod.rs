//! Cache layer
//!
//! Hot reads (single articles, tag clouds, sitemap and feed documents) are
//! cached in-process with moka. Keys are namespaced with `:` so a mutation
//! can drop a whole family with a glob pattern such as `article:*`.
//!
//! ```rust,ignore
//! use inkpress::cache::{create_cache, CacheLayer};
//!
//! let cache = create_cache(&config.cache);
//! cache.set("key", &"value", cache.default_ttl()).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::{pattern_matches, MemoryCache};

/// Cache layer trait
///
/// The methods are generic over the cached type, so this trait is not
/// object safe; share a concrete `Arc<Cache>` instead of `dyn CacheLayer`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Hit/miss counters reported by the admin stats endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Application cache: a memory cache with a default TTL and hit counters
#[derive(Debug)]
pub struct Cache {
    inner: MemoryCache,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Cache {
    pub fn new(inner: MemoryCache, default_ttl: Duration) -> Self {
        Self {
            inner,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// TTL configured under `cache.ttl_seconds`
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.entry_count(),
        }
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let value = self.inner.get(key).await?;
        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        tracing::debug!("Invalidating cache keys matching {}", pattern);
        self.inner.delete_pattern(pattern).await
    }

    async fn clear(&self) -> Result<()> {
        tracing::info!("Clearing cache");
        self.inner.clear().await
    }
}

/// Create the application cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let inner = MemoryCache::with_capacity(config.max_capacity);
    Arc::new(Cache::new(inner, Duration::from_secs(config.ttl_seconds)))
}
