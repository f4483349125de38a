//! Role administration service.
//!
//! The write paths behind role and assignment management. Every mutation is
//! gated on the actor's `security.role.manage` capability, goes through the
//! repository port, and awaits the invalidation coordinator before
//! returning so no caller observes a response while stale grants are still
//! cached. A rejected mutation skips its dependent invalidation entirely.


use std::collections::BTreeSet;
use std::sync::Arc;

use chartfold_core::{AppError, AppResult, NonEmptyString, RoleId, UserId, UserIdentity};
use chartfold_domain::{PermissionDefinition, ROLE_MANAGE, Role, RoleAssignment};
use chrono::{DateTime, Utc};

use crate::authorization_ports::{AssignRoleInput, CreateRoleInput, RoleAdminRepository};
use crate::authorization_service::AuthorizationService;
use crate::invalidation_coordinator::InvalidationCoordinator;

/// Application service for role and assignment administration.
#[derive(Clone)]
pub struct RoleAdminService {
    authorization: AuthorizationService,
    repository: Arc<dyn RoleAdminRepository>,
    invalidation: InvalidationCoordinator,
}

impl RoleAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization: AuthorizationService,
        repository: Arc<dyn RoleAdminRepository>,
        invalidation: InvalidationCoordinator,
    ) -> Self {
        Self {
            authorization,
            repository,
            invalidation,
        }
    }

    /// Returns workspace roles sorted by seniority, then name.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<Role>> {
        self.require_role_manage(actor).await?;

        let mut roles = self.repository.list_roles(actor.workspace_id()).await?;
        roles.sort_by(|left, right| {
            right
                .level
                .cmp(&left.level)
                .then_with(|| left.name.cmp(&right.name))
        });

        Ok(roles)
    }

    /// Returns one role visible from the actor's workspace.
    pub async fn get_role(&self, actor: &UserIdentity, role_id: RoleId) -> AppResult<Role> {
        self.require_role_manage(actor).await?;

        let role = self
            .repository
            .get_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if role
            .workspace_id
            .is_some_and(|scope| scope != actor.workspace_id())
        {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' was not found"
            )));
        }

        Ok(role)
    }

    /// Returns registered permission definitions for administrative views.
    pub async fn list_permission_definitions(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<PermissionDefinition>> {
        self.require_role_manage(actor).await?;
        self.repository.list_permission_definitions().await
    }

    /// Creates a role scoped to the actor's workspace, or a system role.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        self.require_role_manage(actor).await?;
        NonEmptyString::new(input.name.as_str())?;

        if input
            .workspace_id
            .is_some_and(|scope| scope != actor.workspace_id())
        {
            return Err(AppError::Forbidden(format!(
                "user '{}' cannot create roles outside workspace '{}'",
                actor.user_id(),
                actor.workspace_id()
            )));
        }

        // A freshly created role has no holders, so nothing cached can
        // reference it yet.
        self.repository.create_role(input).await
    }

    /// Replaces a role's permission bundle and evicts every stale entry.
    pub async fn update_role_permissions(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
        permissions: BTreeSet<String>,
    ) -> AppResult<Role> {
        self.require_role_manage(actor).await?;

        let role = self
            .repository
            .update_role_permissions(role_id, permissions)
            .await?;

        match role.workspace_id {
            Some(workspace_id) => self.invalidation.invalidate_workspace(workspace_id).await,
            None => self.invalidation.invalidate_role(role.id).await?,
        }

        Ok(role)
    }

    /// Deletes a role that no active assignment references any longer.
    pub async fn delete_role(&self, actor: &UserIdentity, role_id: RoleId) -> AppResult<()> {
        self.require_role_manage(actor).await?;

        self.repository.delete_role(role_id).await?;
        self.invalidation.invalidate_role(role_id).await
    }

    /// Grants a role to a user in the actor's workspace.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<RoleAssignment> {
        self.require_role_manage(actor).await?;

        let assignment = self
            .repository
            .create_assignment(AssignRoleInput {
                user_id,
                workspace_id: actor.workspace_id(),
                role_id,
                assigned_by: actor.user_id(),
                expires_at,
            })
            .await?;

        self.invalidation
            .invalidate(user_id, actor.workspace_id())
            .await;

        Ok(assignment)
    }

    /// Revokes a role assignment in the actor's workspace.
    pub async fn revoke_assignment(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.require_role_manage(actor).await?;

        self.repository
            .revoke_assignment(user_id, actor.workspace_id(), role_id)
            .await?;

        self.invalidation
            .invalidate(user_id, actor.workspace_id())
            .await;

        Ok(())
    }

    /// Returns role assignments in the actor's workspace.
    pub async fn list_assignments(&self, actor: &UserIdentity) -> AppResult<Vec<RoleAssignment>> {
        self.require_role_manage(actor).await?;
        self.repository.list_assignments(actor.workspace_id()).await
    }

    async fn require_role_manage(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization
            .require_permission(actor.user_id(), actor.workspace_id(), ROLE_MANAGE)
            .await
    }
}
