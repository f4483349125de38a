//! In-memory permission store for tests and local runs.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use chartfold_application::{
    AssignRoleInput, CreateRoleInput, PermissionQueries, RoleAdminRepository, RoleHolder,
};
use chartfold_core::{AppError, AppResult, RoleId, UserId, WorkspaceId};
use chartfold_domain::{PermissionDefinition, Role, RoleAssignment, effective_permission_union};

#[derive(Default)]
struct StoreState {
    roles: Vec<Role>,
    assignments: Vec<RoleAssignment>,
    definitions: Vec<PermissionDefinition>,
}

/// In-memory implementation of both permission store ports.
///
/// All three resolution queries answer from the same reference union, so
/// the adapter doubles as an executable statement of strategy
/// equivalence. The aggregate and view paths can be switched off to
/// exercise resolver fall-through the way a missing server-side
/// precomputation would.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    state: RwLock<StoreState>,
    aggregate_unavailable: AtomicBool,
    view_unavailable: AtomicBool,
}

impl InMemoryPermissionStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the precomputed aggregate path on or off.
    pub fn set_aggregate_available(&self, available: bool) {
        self.aggregate_unavailable
            .store(!available, Ordering::Relaxed);
    }

    /// Switches the flattened view path on or off.
    pub fn set_view_available(&self, available: bool) {
        self.view_unavailable.store(!available, Ordering::Relaxed);
    }

    /// Registers permission definitions for administrative listings.
    pub async fn register_permission_definitions(
        &self,
        definitions: Vec<PermissionDefinition>,
    ) {
        self.state.write().await.definitions.extend(definitions);
    }

    async fn union(&self, user_id: UserId, workspace_id: WorkspaceId) -> Vec<String> {
        let state = self.state.read().await;

        effective_permission_union(
            user_id,
            workspace_id,
            &state.assignments,
            &state.roles,
            Utc::now(),
        )
        .into_iter()
        .collect()
    }
}

#[async_trait]
impl PermissionQueries for InMemoryPermissionStore {
    async fn effective_permissions_aggregate(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        if self.aggregate_unavailable.load(Ordering::Relaxed) {
            return Err(AppError::Unavailable(
                "aggregate precomputation is disabled".to_owned(),
            ));
        }

        Ok(self.union(user_id, workspace_id).await)
    }

    async fn effective_permissions_view(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        if self.view_unavailable.load(Ordering::Relaxed) {
            return Err(AppError::Unavailable(
                "flattened permission view is disabled".to_owned(),
            ));
        }

        Ok(self.union(user_id, workspace_id).await)
    }

    async fn effective_permissions_join(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        Ok(self.union(user_id, workspace_id).await)
    }

    async fn active_assignments_for_role(&self, role_id: RoleId) -> AppResult<Vec<RoleHolder>> {
        let state = self.state.read().await;
        let now = Utc::now();

        let mut holders: Vec<RoleHolder> = Vec::new();
        for assignment in &state.assignments {
            if assignment.role_id != role_id || !assignment.is_effective_at(now) {
                continue;
            }

            let holder = RoleHolder {
                user_id: assignment.user_id,
                workspace_id: assignment.workspace_id,
            };
            if !holders.contains(&holder) {
                holders.push(holder);
            }
        }

        Ok(holders)
    }
}

#[async_trait]
impl RoleAdminRepository for InMemoryPermissionStore {
    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .filter(|role| role.workspace_id.is_none_or(|scope| scope == workspace_id))
            .cloned()
            .collect())
    }

    async fn get_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .find(|role| role.id == role_id)
            .cloned())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let mut state = self.state.write().await;

        let duplicate = state.roles.iter().any(|role| {
            role.name == input.name && role.workspace_id == input.workspace_id
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let role = Role {
            id: RoleId::new(),
            workspace_id: input.workspace_id,
            name: input.name,
            level: input.level,
            permissions: input.permissions,
            is_active: true,
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permissions: BTreeSet<String>,
    ) -> AppResult<Role> {
        let mut state = self.state.write().await;

        let role = state
            .roles
            .iter_mut()
            .find(|role| role.id == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        role.permissions = permissions;
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut state = self.state.write().await;

        let holder_count = state
            .assignments
            .iter()
            .filter(|assignment| assignment.role_id == role_id && assignment.is_active)
            .count();
        if holder_count > 0 {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' is still assigned to {holder_count} holder(s)"
            )));
        }

        let before = state.roles.len();
        state.roles.retain(|role| role.id != role_id);
        if state.roles.len() == before {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        state
            .assignments
            .retain(|assignment| assignment.role_id != role_id);
        Ok(())
    }

    async fn create_assignment(&self, input: AssignRoleInput) -> AppResult<RoleAssignment> {
        let mut state = self.state.write().await;

        let role_is_available = state.roles.iter().any(|role| {
            role.id == input.role_id && role.is_resolvable_in(input.workspace_id)
        });
        if !role_is_available {
            return Err(AppError::NotFound(format!(
                "role '{}' is not available in workspace '{}'",
                input.role_id, input.workspace_id
            )));
        }

        let assignment = RoleAssignment {
            user_id: input.user_id,
            workspace_id: input.workspace_id,
            role_id: input.role_id,
            assigned_by: input.assigned_by,
            assigned_at: Utc::now(),
            expires_at: input.expires_at,
            is_active: true,
        };

        let existing = state.assignments.iter_mut().find(|stored| {
            stored.user_id == input.user_id
                && stored.workspace_id == input.workspace_id
                && stored.role_id == input.role_id
        });

        match existing {
            Some(stored) => *stored = assignment.clone(),
            None => state.assignments.push(assignment.clone()),
        }

        Ok(assignment)
    }

    async fn revoke_assignment(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;

        let assignment = state.assignments.iter_mut().find(|assignment| {
            assignment.user_id == user_id
                && assignment.workspace_id == workspace_id
                && assignment.role_id == role_id
                && assignment.is_active
        });

        match assignment {
            Some(assignment) => {
                assignment.is_active = false;
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "assignment '{user_id}:{role_id}' was not found"
            ))),
        }
    }

    async fn list_assignments(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|assignment| assignment.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn list_permission_definitions(&self) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self.state.read().await.definitions.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chartfold_application::{
        AssignRoleInput, CreateRoleInput, PermissionKeySpace, PermissionQueries,
        PermissionResolver, ResolverConfig, RoleAdminRepository,
    };
    use chartfold_core::{AppError, RoleId, UserId, WorkspaceId};
    use chrono::{Duration, Utc};

    use crate::in_memory_key_value_cache::InMemoryKeyValueCache;

    use super::InMemoryPermissionStore;

    fn bundle(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    async fn seed_role(
        store: &InMemoryPermissionStore,
        workspace_id: Option<WorkspaceId>,
        names: &[&str],
    ) -> RoleId {
        let created = store
            .create_role(CreateRoleInput {
                workspace_id,
                name: format!("role-{}", RoleId::new()),
                level: 10,
                permissions: bundle(names),
            })
            .await;

        created.map(|role| role.id).unwrap_or_default()
    }

    async fn seed_assignment(
        store: &InMemoryPermissionStore,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role_id: RoleId,
        expires_in_minutes: Option<i64>,
    ) {
        let created = store
            .create_assignment(AssignRoleInput {
                user_id,
                workspace_id,
                role_id,
                assigned_by: UserId::new(),
                expires_at: expires_in_minutes.map(|minutes| Utc::now() + Duration::minutes(minutes)),
            })
            .await;
        assert!(created.is_ok());
    }

    #[tokio::test]
    async fn all_three_strategies_agree_on_identical_rows() {
        let store = InMemoryPermissionStore::new();
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();

        let viewer = seed_role(&store, Some(workspace_id), &["dashboard.read"]).await;
        let editor = seed_role(&store, Some(workspace_id), &["dashboard.read", "chart.write"]).await;
        let expired_role = seed_role(&store, Some(workspace_id), &["export.create"]).await;
        seed_assignment(&store, user_id, workspace_id, viewer, None).await;
        seed_assignment(&store, user_id, workspace_id, editor, None).await;
        seed_assignment(&store, user_id, workspace_id, expired_role, Some(-5)).await;

        let aggregate: BTreeSet<String> = store
            .effective_permissions_aggregate(user_id, workspace_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();
        let view: BTreeSet<String> = store
            .effective_permissions_view(user_id, workspace_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();
        let join: BTreeSet<String> = store
            .effective_permissions_join(user_id, workspace_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();

        assert_eq!(aggregate, bundle(&["dashboard.read", "chart.write"]));
        assert_eq!(view, aggregate);
        assert_eq!(join, aggregate);
    }

    #[tokio::test]
    async fn disabled_precomputations_read_as_unavailable() {
        let store = InMemoryPermissionStore::new();
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        store.set_aggregate_available(false);
        store.set_view_available(false);

        let aggregate = store
            .effective_permissions_aggregate(user_id, workspace_id)
            .await;
        let view = store.effective_permissions_view(user_id, workspace_id).await;
        let join = store.effective_permissions_join(user_id, workspace_id).await;

        assert!(matches!(aggregate, Err(AppError::Unavailable(_))));
        assert!(matches!(view, Err(AppError::Unavailable(_))));
        assert!(join.is_ok());
    }

    #[tokio::test]
    async fn role_holders_exclude_expired_and_revoked_assignments() {
        let store = InMemoryPermissionStore::new();
        let workspace_id = WorkspaceId::new();
        let role_id = seed_role(&store, Some(workspace_id), &["dashboard.read"]).await;

        let current_holder = UserId::new();
        let expired_holder = UserId::new();
        let revoked_holder = UserId::new();
        seed_assignment(&store, current_holder, workspace_id, role_id, None).await;
        seed_assignment(&store, expired_holder, workspace_id, role_id, Some(-5)).await;
        seed_assignment(&store, revoked_holder, workspace_id, role_id, None).await;
        let revoked = store
            .revoke_assignment(revoked_holder, workspace_id, role_id)
            .await;
        assert!(revoked.is_ok());

        let holders = store.active_assignments_for_role(role_id).await;

        let holder_ids: Vec<UserId> = holders
            .unwrap_or_default()
            .into_iter()
            .map(|holder| holder.user_id)
            .collect();
        assert_eq!(holder_ids, vec![current_holder]);
    }

    #[tokio::test]
    async fn delete_role_in_use_is_rejected() {
        let store = InMemoryPermissionStore::new();
        let workspace_id = WorkspaceId::new();
        let role_id = seed_role(&store, Some(workspace_id), &["dashboard.read"]).await;
        seed_assignment(&store, UserId::new(), workspace_id, role_id, None).await;

        let result = store.delete_role(role_id).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn regrant_reactivates_a_revoked_assignment() {
        let store = InMemoryPermissionStore::new();
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let role_id = seed_role(&store, Some(workspace_id), &["dashboard.read"]).await;

        seed_assignment(&store, user_id, workspace_id, role_id, None).await;
        let revoked = store.revoke_assignment(user_id, workspace_id, role_id).await;
        assert!(revoked.is_ok());
        assert!(
            store
                .effective_permissions_join(user_id, workspace_id)
                .await
                .unwrap_or_default()
                .is_empty()
        );

        seed_assignment(&store, user_id, workspace_id, role_id, None).await;

        let resolved = store
            .effective_permissions_join(user_id, workspace_id)
            .await
            .unwrap_or_default();
        assert_eq!(resolved, vec!["dashboard.read".to_owned()]);
    }

    #[tokio::test]
    async fn resolver_fall_through_matches_the_optimized_paths() {
        let store = Arc::new(InMemoryPermissionStore::new());
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let role_id = seed_role(&store, Some(workspace_id), &["dashboard.read", "chart.read"]).await;
        seed_assignment(&store, user_id, workspace_id, role_id, None).await;

        let resolver = PermissionResolver::new(
            store.clone(),
            Arc::new(InMemoryKeyValueCache::new()),
            PermissionKeySpace::default(),
            ResolverConfig::default(),
        );

        let optimized = resolver
            .resolve_effective_permissions(user_id, workspace_id)
            .await;

        store.set_aggregate_available(false);
        store.set_view_available(false);
        let fallback_resolver = PermissionResolver::new(
            store.clone(),
            Arc::new(InMemoryKeyValueCache::new()),
            PermissionKeySpace::default(),
            ResolverConfig::default(),
        );
        let via_join = fallback_resolver
            .resolve_effective_permissions(user_id, workspace_id)
            .await;

        assert_eq!(optimized, bundle(&["dashboard.read", "chart.read"]));
        assert_eq!(via_join, optimized);
    }

    #[tokio::test]
    async fn foreign_workspace_role_cannot_be_assigned() {
        let store = InMemoryPermissionStore::new();
        let role_id = seed_role(&store, Some(WorkspaceId::new()), &["dashboard.read"]).await;

        let result = store
            .create_assignment(AssignRoleInput {
                user_id: UserId::new(),
                workspace_id: WorkspaceId::new(),
                role_id,
                assigned_by: UserId::new(),
                expires_at: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
