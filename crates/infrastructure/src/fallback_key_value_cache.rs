//! Degrading composite over a shared and an in-process cache backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chartfold_application::KeyValueCache;
use chartfold_core::AppResult;

use crate::in_memory_key_value_cache::InMemoryKeyValueCache;

/// Key-value cache that degrades transparently to an in-process map.
///
/// Reads and writes go to the shared backend; any failure is logged and the
/// call is retried against the in-process fallback, so no operation ever
/// returns an error. Evictions are applied to both backends on every call
/// because an entry may live in either after a partial outage.
pub struct FallbackKeyValueCache {
    primary: Arc<dyn KeyValueCache>,
    fallback: InMemoryKeyValueCache,
}

impl FallbackKeyValueCache {
    /// Creates a composite over the shared backend.
    #[must_use]
    pub fn new(primary: Arc<dyn KeyValueCache>) -> Self {
        Self {
            primary,
            fallback: InMemoryKeyValueCache::new(),
        }
    }
}

#[async_trait]
impl KeyValueCache for FallbackKeyValueCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        match self.primary.get(key).await {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::warn!(%error, "shared cache read failed, serving from in-process fallback");
                self.fallback.get(key).await
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        match self.primary.set(key, value, ttl).await {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::warn!(%error, "shared cache write failed, writing to in-process fallback");
                self.fallback.set(key, value, ttl).await
            }
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if let Err(error) = self.primary.delete(key).await {
            tracing::warn!(%error, "shared cache eviction failed");
        }

        self.fallback.delete(key).await
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AppResult<()> {
        if let Err(error) = self.primary.delete_by_pattern(pattern).await {
            tracing::warn!(%error, "shared cache pattern eviction failed");
        }

        self.fallback.delete_by_pattern(pattern).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        match self.primary.exists(key).await {
            Ok(present) => Ok(present),
            Err(error) => {
                tracing::warn!(%error, "shared cache probe failed, probing in-process fallback");
                self.fallback.exists(key).await
            }
        }
    }

    /// Reports the shared backend's health; the composite itself keeps
    /// serving from the fallback either way.
    async fn health(&self) -> bool {
        self.primary.health().await
    }
}
