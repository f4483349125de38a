//! Redis-backed key-value cache adapter.

use std::time::Duration;

use async_trait::async_trait;
use chartfold_application::KeyValueCache;
use chartfold_core::{AppError, AppResult};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

/// Keys requested per SCAN round trip during pattern eviction.
const SCAN_BATCH_SIZE: usize = 200;

/// Redis implementation of the key-value cache port.
///
/// Shared across process instances; pattern eviction walks the keyspace
/// with SCAN/MATCH instead of the blocking KEYS command.
#[derive(Clone)]
pub struct RedisKeyValueCache {
    client: redis::Client,
}

impl RedisKeyValueCache {
    /// Creates a cache adapter with a configured Redis client.
    #[must_use]
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl KeyValueCache for RedisKeyValueCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;

        connection.get(key).await.map_err(|error| {
            AppError::Unavailable(format!("failed to read cache entry: {error}"))
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut connection = self.connection().await?;

        match ttl {
            Some(ttl) => connection
                .set_ex(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to write cache entry: {error}"))
                }),
            None => connection.set(key, value).await.map_err(|error| {
                AppError::Unavailable(format!("failed to write cache entry: {error}"))
            }),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;

        connection.del(key).await.map_err(|error| {
            AppError::Unavailable(format!("failed to delete cache entry: {error}"))
        })
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let mut cursor = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to scan cache keys: {error}"))
                })?;

            if !keys.is_empty() {
                let _: () = connection.del(keys).await.map_err(|error| {
                    AppError::Unavailable(format!("failed to delete matched cache keys: {error}"))
                })?;
            }

            if next_cursor == 0 {
                return Ok(());
            }
            cursor = next_cursor;
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        connection.exists(key).await.map_err(|error| {
            AppError::Unavailable(format!("failed to probe cache entry: {error}"))
        })
    }

    async fn health(&self) -> bool {
        let Ok(mut connection) = self.connection().await else {
            return false;
        };

        let response: Result<String, _> = redis::cmd("PING").query_async(&mut connection).await;
        response.is_ok()
    }
}
