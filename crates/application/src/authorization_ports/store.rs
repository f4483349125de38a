use async_trait::async_trait;
use chartfold_core::{AppResult, RoleId, UserId, WorkspaceId};

/// A user/workspace pair currently holding a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleHolder {
    /// User holding the role.
    pub user_id: UserId,
    /// Workspace the grant is scoped to.
    pub workspace_id: WorkspaceId,
}

/// Read-side store port for permission resolution.
///
/// The three `effective_permissions_*` operations are semantically
/// equivalent on identical underlying rows; they differ only in the
/// server-side optimization they require. An implementation missing an
/// optimization surfaces `AppError::Unavailable` so the resolver can fall
/// through to the next operation.
#[async_trait]
pub trait PermissionQueries: Send + Sync {
    /// Returns the precomputed per-pair permission aggregate.
    async fn effective_permissions_aggregate(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>>;

    /// Returns distinct permission names from the flattened
    /// assignment→role→permission view, already filtered to effective rows.
    async fn effective_permissions_view(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>>;

    /// Returns distinct permission names via an explicit join over the base
    /// entities. Always implementable; the resolution path of last resort.
    async fn effective_permissions_join(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>>;

    /// Lists every pair holding `role_id` through an effective assignment.
    async fn active_assignments_for_role(&self, role_id: RoleId) -> AppResult<Vec<RoleHolder>>;
}
