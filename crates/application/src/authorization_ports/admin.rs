use std::collections::BTreeSet;

use async_trait::async_trait;
use chartfold_core::{AppResult, RoleId, UserId, WorkspaceId};
use chartfold_domain::{PermissionDefinition, Role, RoleAssignment};
use chrono::{DateTime, Utc};

/// Input payload for creating roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Owning workspace, or `None` for system roles.
    pub workspace_id: Option<WorkspaceId>,
    /// Unique role name in its scope.
    pub name: String,
    /// Seniority ordering used for display sorting.
    pub level: i32,
    /// Capability names granted by the role.
    pub permissions: BTreeSet<String>,
}

/// Input payload for granting a role to a user within a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// User receiving the grant.
    pub user_id: UserId,
    /// Workspace the grant is scoped to.
    pub workspace_id: WorkspaceId,
    /// Role to grant.
    pub role_id: RoleId,
    /// User creating the grant.
    pub assigned_by: UserId,
    /// Optional expiry for time-bounded grants.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository port for role and assignment administration.
///
/// Writes touching more than one entity are transactional; a rejected
/// mutation leaves the store unchanged.
#[async_trait]
pub trait RoleAdminRepository: Send + Sync {
    /// Lists roles resolvable in a workspace, including system roles.
    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<Role>>;

    /// Returns one role by identifier.
    async fn get_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Creates a role and attaches its grants.
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role>;

    /// Replaces a role's permission bundle wholesale.
    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permissions: BTreeSet<String>,
    ) -> AppResult<Role>;

    /// Deletes a role. Rejected with `AppError::Conflict` while any active
    /// assignment still references it.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Creates an assignment. Rejected with `AppError::NotFound` when the
    /// role is missing or inactive.
    async fn create_assignment(&self, input: AssignRoleInput) -> AppResult<RoleAssignment>;

    /// Revokes an assignment for the given pair and role.
    async fn revoke_assignment(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Lists assignments in workspace scope.
    async fn list_assignments(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleAssignment>>;

    /// Lists registered permission definitions.
    async fn list_permission_definitions(&self) -> AppResult<Vec<PermissionDefinition>>;
}
