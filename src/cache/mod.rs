//! Cache layer
//!
//! Process-local cache used for public listings, short-link lookups on the
//! edge handler and fetched Open Graph metadata.
//!
//! ```rust,ignore
//! use folio::cache::{create_cache, CacheLayer};
//! use folio::config::CacheConfig;
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

/// Cache layer trait
///
/// The generic methods keep this trait from being object safe, so services
/// hold the concrete [`Cache`] type.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// The cache implementation shared by all services
pub type Cache = MemoryCache;

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let ttl = Duration::from_secs(config.ttl_seconds.max(1));
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_default_config() {
        let cache = create_cache(&CacheConfig::default());
        assert_eq!(cache.default_ttl(), Duration::from_secs(3600));

        cache.set("k", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        let value: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_entry_ttl_is_capped_by_config() {
        let cache = create_cache(&CacheConfig {
            ttl_seconds: 1,
            max_capacity: 100,
        });
        cache.set("k", &1u8, Duration::from_secs(3600)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get::<u8>("k").await.unwrap(), None);
    }
}
