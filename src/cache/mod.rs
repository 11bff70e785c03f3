//! Cache layer
//!
//! In-process caching (moka) for read-heavy, slowly changing data: the
//! category list/tree and trending rankings.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mediapress::cache::{create_cache, CacheLayer};
//! use mediapress::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache key for the flat category list
pub const CATEGORY_LIST_KEY: &str = "categories:list";
/// Cache key for the category tree
pub const CATEGORY_TREE_KEY: &str = "categories:tree";
/// Pattern covering every category entry
pub const CATEGORY_PATTERN: &str = "categories:*";
/// Pattern covering every trending page
pub const TRENDING_PATTERN: &str = "trending:*";

/// Cache key for one page of trending content
pub fn trending_key(limit: i64, offset: i64) -> String {
    format!("trending:{}:{}", limit, offset)
}

/// Cache layer trait
///
/// The generic methods make this trait unusable as `dyn CacheLayer`;
/// services hold the concrete [`MemoryCache`].
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL. A zero TTL removes the key instead.
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity(config.max_capacity))
}
