//! Invalidation coordinator.
//!
//! Evicts exactly the cached permission sets a mutation made stale, before
//! the mutating operation's response is observed. Cache eviction failures
//! are logged and swallowed; enumerating the holders of a role is a store
//! read and its failure is surfaced, since skipping it silently would leave
//! revoked grants served from cache.

use std::sync::Arc;

use chartfold_core::{AppResult, RoleId, UserId, WorkspaceId};

use crate::authorization_ports::{KeyValueCache, PermissionQueries};
use crate::permission_resolver::PermissionKeySpace;

/// Coordinates cache eviction for role and assignment mutations.
#[derive(Clone)]
pub struct InvalidationCoordinator {
    store: Arc<dyn PermissionQueries>,
    cache: Arc<dyn KeyValueCache>,
    key_space: PermissionKeySpace,
}

impl InvalidationCoordinator {
    /// Creates a coordinator sharing the resolver's cache and key space.
    #[must_use]
    pub fn new(
        store: Arc<dyn PermissionQueries>,
        cache: Arc<dyn KeyValueCache>,
        key_space: PermissionKeySpace,
    ) -> Self {
        Self {
            store,
            cache,
            key_space,
        }
    }

    /// Evicts the cached set for one user/workspace pair.
    ///
    /// Called after a single assignment change.
    pub async fn invalidate(&self, user_id: UserId, workspace_id: WorkspaceId) {
        let key = self.key_space.entry_key(user_id, workspace_id);

        if let Err(error) = self.cache.delete(&key).await {
            tracing::warn!(%error, %user_id, %workspace_id, "permission cache eviction failed");
        }
    }

    /// Evicts every cached set in a workspace via pattern eviction.
    ///
    /// Called after a workspace-wide role-definition edit.
    pub async fn invalidate_workspace(&self, workspace_id: WorkspaceId) {
        let pattern = self.key_space.workspace_pattern(workspace_id);

        if let Err(error) = self.cache.delete_by_pattern(&pattern).await {
            tracing::warn!(%error, %workspace_id, "workspace-wide permission cache eviction failed");
        }
    }

    /// Evicts the cached set of every current holder of a role.
    ///
    /// Called after a role's bundle is edited or the role is deleted; the
    /// cache keys by user/workspace, so holders are enumerated first via
    /// the bounded assignments-for-role query.
    pub async fn invalidate_role(&self, role_id: RoleId) -> AppResult<()> {
        let holders = self.store.active_assignments_for_role(role_id).await?;

        for holder in holders {
            self.invalidate(holder.user_id, holder.workspace_id).await;
        }

        Ok(())
    }
}
