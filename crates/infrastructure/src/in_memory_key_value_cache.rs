//! In-process key-value cache adapter.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chartfold_application::KeyValueCache;
use chartfold_core::AppResult;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= Instant::now())
    }
}

/// In-memory implementation of the key-value cache port.
///
/// Entry expiry is checked lazily on access; pattern eviction matches the
/// same glob dialect the shared backend uses.
#[derive(Default)]
pub struct InMemoryKeyValueCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryKeyValueCache {
    /// Creates an empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for InMemoryKeyValueCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let now = Instant::now();
        let expires_at = ttl.map(|ttl| now.checked_add(ttl).unwrap_or(now));

        self.entries.write().await.insert(
            key.to_owned(),
            CacheEntry {
                value: value.to_owned(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AppResult<()> {
        self.entries
            .write()
            .await
            .retain(|key, _| !matches_glob(pattern, key));
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Matches `input` against a glob `pattern` supporting `*` and `?`.
fn matches_glob(pattern: &str, input: &str) -> bool {
    let pattern = pattern.as_bytes();
    let input = input.as_bytes();

    let mut pattern_index = 0;
    let mut input_index = 0;
    let mut star_index = None;
    let mut star_match = 0;

    while input_index < input.len() {
        if pattern_index < pattern.len()
            && (pattern[pattern_index] == b'?' || pattern[pattern_index] == input[input_index])
        {
            pattern_index += 1;
            input_index += 1;
        } else if pattern_index < pattern.len() && pattern[pattern_index] == b'*' {
            star_index = Some(pattern_index);
            star_match = input_index;
            pattern_index += 1;
        } else if let Some(last_star) = star_index {
            pattern_index = last_star + 1;
            star_match += 1;
            input_index = star_match;
        } else {
            return false;
        }
    }

    while pattern_index < pattern.len() && pattern[pattern_index] == b'*' {
        pattern_index += 1;
    }

    pattern_index == pattern.len()
}
