use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chartfold_core::{AppResult, UserId, WorkspaceId};

use crate::authorization_ports::PermissionQueries;

/// One candidate way to compute an effective permission set.
///
/// Strategies are semantically equivalent on identical underlying rows and
/// differ only in the store-side optimization they require, so a missing
/// optimization degrades latency, never correctness.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Stable name used in degradation logs.
    fn name(&self) -> &'static str;

    /// Computes the set, or fails so the next strategy can take over.
    async fn resolve(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<BTreeSet<String>>;
}

/// Fastest strategy: reads the precomputed per-pair aggregate.
pub struct AggregateStrategy {
    store: Arc<dyn PermissionQueries>,
}

impl AggregateStrategy {
    /// Creates the strategy over a permission store.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionQueries>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResolutionStrategy for AggregateStrategy {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    async fn resolve(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<BTreeSet<String>> {
        let names = self
            .store
            .effective_permissions_aggregate(user_id, workspace_id)
            .await?;

        Ok(names.into_iter().collect())
    }
}

/// Reads the flattened assignment→role→permission view.
pub struct ProjectedViewStrategy {
    store: Arc<dyn PermissionQueries>,
}

impl ProjectedViewStrategy {
    /// Creates the strategy over a permission store.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionQueries>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResolutionStrategy for ProjectedViewStrategy {
    fn name(&self) -> &'static str {
        "projected_view"
    }

    async fn resolve(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<BTreeSet<String>> {
        let names = self
            .store
            .effective_permissions_view(user_id, workspace_id)
            .await?;

        Ok(names.into_iter().collect())
    }
}

/// Last resort: explicit join over the base entities, always available.
pub struct ManualJoinStrategy {
    store: Arc<dyn PermissionQueries>,
}

impl ManualJoinStrategy {
    /// Creates the strategy over a permission store.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionQueries>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResolutionStrategy for ManualJoinStrategy {
    fn name(&self) -> &'static str {
        "manual_join"
    }

    async fn resolve(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<BTreeSet<String>> {
        let names = self
            .store
            .effective_permissions_join(user_id, workspace_id)
            .await?;

        Ok(names.into_iter().collect())
    }
}
