//! Role-aggregation resolver.
//!
//! Computes a user's effective permission set for a workspace via a
//! prioritized chain of resolution strategies, publishing results through
//! the key-value cache. Resolution is fail-closed: every internal failure
//! collapses to the empty set, so absence of a grant is always the default.

mod config;
mod key_space;
mod strategies;
#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::sync::Arc;

use chartfold_core::{AppError, AppResult, UserId, WorkspaceId};

use crate::authorization_ports::{KeyValueCache, PermissionQueries};

pub use config::ResolverConfig;
pub use key_space::PermissionKeySpace;
pub use strategies::{
    AggregateStrategy, ManualJoinStrategy, ProjectedViewStrategy, ResolutionStrategy,
};

/// Resolves effective permission sets through cache and strategy chain.
#[derive(Clone)]
pub struct PermissionResolver {
    strategies: Vec<Arc<dyn ResolutionStrategy>>,
    cache: Arc<dyn KeyValueCache>,
    key_space: PermissionKeySpace,
    config: ResolverConfig,
}

impl PermissionResolver {
    /// Creates a resolver with the standard strategy chain over one store.
    #[must_use]
    pub fn new(
        store: Arc<dyn PermissionQueries>,
        cache: Arc<dyn KeyValueCache>,
        key_space: PermissionKeySpace,
        config: ResolverConfig,
    ) -> Self {
        let strategies: Vec<Arc<dyn ResolutionStrategy>> = vec![
            Arc::new(AggregateStrategy::new(store.clone())),
            Arc::new(ProjectedViewStrategy::new(store.clone())),
            Arc::new(ManualJoinStrategy::new(store)),
        ];

        Self::with_strategies(strategies, cache, key_space, config)
    }

    /// Creates a resolver over an explicit strategy chain, tried in order.
    #[must_use]
    pub fn with_strategies(
        strategies: Vec<Arc<dyn ResolutionStrategy>>,
        cache: Arc<dyn KeyValueCache>,
        key_space: PermissionKeySpace,
        config: ResolverConfig,
    ) -> Self {
        Self {
            strategies,
            cache,
            key_space,
            config,
        }
    }

    /// Returns the key space shared with the invalidation coordinator.
    #[must_use]
    pub fn key_space(&self) -> &PermissionKeySpace {
        &self.key_space
    }

    /// Computes the effective permission set for a user/workspace pair.
    ///
    /// A cached set (including a correctly computed empty one) is
    /// returned without touching the store. On a miss, strategies run in
    /// priority order and the first success is cached with the configured
    /// TTL. Exhaustion of the chain resolves to the empty set.
    pub async fn resolve_effective_permissions(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> BTreeSet<String> {
        let key = self.key_space.entry_key(user_id, workspace_id);

        match self.cache.get(&key).await {
            Ok(Some(encoded)) => match decode_permission_set(&encoded) {
                Ok(resolved) => return resolved,
                Err(error) => {
                    tracing::warn!(%error, %user_id, %workspace_id, "discarding undecodable cached permission set");
                }
            },
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, %user_id, %workspace_id, "permission cache read failed, treating as miss");
            }
        }

        let Some(resolved) = self.run_strategy_chain(user_id, workspace_id).await else {
            return BTreeSet::new();
        };

        self.publish(&key, &resolved).await;
        resolved
    }

    async fn run_strategy_chain(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> Option<BTreeSet<String>> {
        for strategy in &self.strategies {
            match strategy.resolve(user_id, workspace_id).await {
                Ok(resolved) => return Some(resolved),
                Err(error) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        %error,
                        %user_id,
                        %workspace_id,
                        "resolution strategy failed, falling through"
                    );
                }
            }
        }

        tracing::warn!(%user_id, %workspace_id, "all resolution strategies failed, resolving to empty set");
        None
    }

    async fn publish(&self, key: &str, resolved: &BTreeSet<String>) {
        let encoded = match encode_permission_set(resolved) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::warn!(%error, "failed to encode permission set for caching");
                return;
            }
        };

        if let Err(error) = self
            .cache
            .set(key, &encoded, Some(self.config.cache_ttl))
            .await
        {
            tracing::warn!(%error, "permission cache write failed, continuing uncached");
        }
    }
}

fn encode_permission_set(resolved: &BTreeSet<String>) -> AppResult<String> {
    serde_json::to_string(resolved)
        .map_err(|error| AppError::Internal(format!("failed to encode permission set: {error}")))
}

fn decode_permission_set(encoded: &str) -> AppResult<BTreeSet<String>> {
    serde_json::from_str(encoded).map_err(|error| {
        AppError::Internal(format!("invalid cached permission set '{encoded}': {error}"))
    })
}
