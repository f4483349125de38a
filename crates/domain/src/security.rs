use std::collections::BTreeSet;

use chartfold_core::{RoleId, UserId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable capability descriptor registered with the platform.
///
/// Definitions are deactivated rather than deleted while any role still
/// references their name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// Unique capability name, e.g. `"dashboard.read"`.
    pub name: String,
    /// Grouping used by administrative listings.
    pub category: String,
    /// Resource the capability applies to.
    pub resource_type: String,
    /// Action the capability grants on the resource.
    pub action: String,
    /// Indicates a platform-managed definition.
    pub is_system: bool,
    /// Indicates the definition is currently in use.
    pub is_active: bool,
}

/// A named bundle of capability names granted together.
///
/// A role with no `workspace_id` is a system role visible in every
/// workspace; otherwise the role is scoped to the one workspace that owns
/// it. Names inside the bundle with no registered [`PermissionDefinition`]
/// aggregate without error and simply never match a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Owning workspace, or `None` for system roles.
    pub workspace_id: Option<WorkspaceId>,
    /// Unique role name in its scope.
    pub name: String,
    /// Seniority ordering used for display sorting.
    pub level: i32,
    /// Capability names granted by this role.
    pub permissions: BTreeSet<String>,
    /// Indicates the role can still be resolved and assigned.
    pub is_active: bool,
}

impl Role {
    /// Returns whether this is a platform-wide system role.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.workspace_id.is_none()
    }

    /// Returns whether the role contributes grants inside a workspace.
    #[must_use]
    pub fn is_resolvable_in(&self, workspace_id: WorkspaceId) -> bool {
        self.is_active && self.workspace_id.is_none_or(|scope| scope == workspace_id)
    }
}

/// A time-bounded grant of a role to a user within a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// User receiving the grant.
    pub user_id: UserId,
    /// Workspace the grant is scoped to.
    pub workspace_id: WorkspaceId,
    /// Granted role.
    pub role_id: RoleId,
    /// User that created the grant.
    pub assigned_by: UserId,
    /// Grant creation timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Optional expiry; the grant stops counting once passed.
    pub expires_at: Option<DateTime<Utc>>,
    /// Indicates the grant has not been revoked.
    pub is_active: bool,
}

impl RoleAssignment {
    /// Returns whether the assignment contributes grants at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expiry| expiry > now)
    }
}

/// Computes the effective permission set for a user/workspace pair.
///
/// This is the reference semantics every resolution strategy must agree
/// with: the union of bundles across roles reachable through an assignment
/// effective at `now`. Assignments referencing a missing or inactive role
/// are excluded without error.
#[must_use]
pub fn effective_permission_union(
    user_id: UserId,
    workspace_id: WorkspaceId,
    assignments: &[RoleAssignment],
    roles: &[Role],
    now: DateTime<Utc>,
) -> BTreeSet<String> {
    let mut effective = BTreeSet::new();

    for assignment in assignments {
        if assignment.user_id != user_id
            || assignment.workspace_id != workspace_id
            || !assignment.is_effective_at(now)
        {
            continue;
        }

        let role = roles
            .iter()
            .find(|candidate| candidate.id == assignment.role_id);

        if let Some(role) = role
            && role.is_resolvable_in(workspace_id)
        {
            effective.extend(role.permissions.iter().cloned());
        }
    }

    effective
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chartfold_core::{RoleId, UserId, WorkspaceId};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    use super::{Role, RoleAssignment, effective_permission_union};

    fn role(id: RoleId, workspace_id: Option<WorkspaceId>, names: &[&str]) -> Role {
        Role {
            id,
            workspace_id,
            name: "analyst".to_owned(),
            level: 10,
            permissions: names.iter().map(|name| (*name).to_owned()).collect(),
            is_active: true,
        }
    }

    fn assignment(user_id: UserId, workspace_id: WorkspaceId, role_id: RoleId) -> RoleAssignment {
        RoleAssignment {
            user_id,
            workspace_id,
            role_id,
            assigned_by: UserId::new(),
            assigned_at: Utc::now(),
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn union_spans_every_effective_assignment() {
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let viewer = role(RoleId::new(), Some(workspace_id), &["dashboard.read"]);
        let editor = role(
            RoleId::new(),
            Some(workspace_id),
            &["dashboard.read", "chart.write"],
        );
        let roles = vec![viewer.clone(), editor.clone()];
        let assignments = vec![
            assignment(user_id, workspace_id, viewer.id),
            assignment(user_id, workspace_id, editor.id),
        ];

        let resolved =
            effective_permission_union(user_id, workspace_id, &assignments, &roles, Utc::now());

        let expected: BTreeSet<String> = ["dashboard.read", "chart.write"]
            .iter()
            .map(|name| (*name).to_owned())
            .collect();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn expired_assignment_contributes_nothing() {
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let viewer = role(RoleId::new(), Some(workspace_id), &["dashboard.read"]);
        let mut expired = assignment(user_id, workspace_id, viewer.id);
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));

        let resolved = effective_permission_union(
            user_id,
            workspace_id,
            &[expired],
            &[viewer],
            Utc::now(),
        );

        assert!(resolved.is_empty());
    }

    #[test]
    fn missing_role_reference_is_excluded_silently() {
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let dangling = assignment(user_id, workspace_id, RoleId::new());

        let resolved =
            effective_permission_union(user_id, workspace_id, &[dangling], &[], Utc::now());

        assert!(resolved.is_empty());
    }

    #[test]
    fn inactive_role_is_excluded_silently() {
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let mut viewer = role(RoleId::new(), Some(workspace_id), &["dashboard.read"]);
        viewer.is_active = false;
        let assignments = vec![assignment(user_id, workspace_id, viewer.id)];

        let resolved =
            effective_permission_union(user_id, workspace_id, &assignments, &[viewer], Utc::now());

        assert!(resolved.is_empty());
    }

    #[test]
    fn system_role_resolves_in_any_workspace() {
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let admin = role(RoleId::new(), None, &["workspace.admin"]);
        let assignments = vec![assignment(user_id, workspace_id, admin.id)];

        let resolved =
            effective_permission_union(user_id, workspace_id, &assignments, &[admin], Utc::now());

        assert!(resolved.contains("workspace.admin"));
    }

    #[test]
    fn foreign_workspace_role_is_excluded() {
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let foreign = role(RoleId::new(), Some(WorkspaceId::new()), &["dashboard.read"]);
        let assignments = vec![assignment(user_id, workspace_id, foreign.id)];

        let resolved =
            effective_permission_union(user_id, workspace_id, &assignments, &[foreign], Utc::now());

        assert!(resolved.is_empty());
    }

    proptest! {
        #[test]
        fn union_contains_exactly_the_effective_bundles(
            bundle_sizes in proptest::collection::vec(0usize..4, 1..6),
            active_flags in proptest::collection::vec(any::<bool>(), 6),
            expired_flags in proptest::collection::vec(any::<bool>(), 6),
        ) {
            let user_id = UserId::new();
            let workspace_id = WorkspaceId::new();
            let now = Utc::now();

            let mut roles = Vec::new();
            let mut assignments = Vec::new();
            let mut expected = BTreeSet::new();

            for (index, bundle_size) in bundle_sizes.iter().enumerate() {
                let names: Vec<String> = (0..*bundle_size)
                    .map(|grant| format!("resource{index}.action{grant}"))
                    .collect();
                let role = Role {
                    id: RoleId::new(),
                    workspace_id: Some(workspace_id),
                    name: format!("role{index}"),
                    level: 0,
                    permissions: names.iter().cloned().collect(),
                    is_active: true,
                };

                let is_active = active_flags[index % active_flags.len()];
                let is_expired = expired_flags[index % expired_flags.len()];
                let assignment = RoleAssignment {
                    user_id,
                    workspace_id,
                    role_id: role.id,
                    assigned_by: UserId::new(),
                    assigned_at: now,
                    expires_at: is_expired.then(|| now - Duration::minutes(5)),
                    is_active,
                };

                if is_active && !is_expired {
                    expected.extend(names.iter().cloned());
                }

                roles.push(role);
                assignments.push(assignment);
            }

            let resolved =
                effective_permission_union(user_id, workspace_id, &assignments, &roles, now);

            prop_assert_eq!(resolved, expected);
        }
    }
}
