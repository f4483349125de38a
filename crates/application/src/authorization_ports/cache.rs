use std::time::Duration;

use async_trait::async_trait;
use chartfold_core::AppResult;

/// TTL-capable key-value cache port used as a read-through cache.
///
/// Losing every entry must never change a correctness outcome, only
/// latency; callers treat a failed read as a miss and a failed write as a
/// no-op.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Returns the value stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry wholesale.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// Removes one key.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Removes every key matching a glob pattern such as `authz:*`.
    async fn delete_by_pattern(&self, pattern: &str) -> AppResult<()>;

    /// Returns whether a key currently exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Returns whether the backend currently answers calls.
    async fn health(&self) -> bool;
}
