//! Authorization facade.
//!
//! The sanctioned gate for every authorization decision in the platform.
//! All operations are pure derivations over the resolver, so correctness is
//! inherited rather than reimplemented, and a denial is indistinguishable
//! from a resolution failure.

use std::collections::BTreeSet;

use chartfold_core::{AppError, AppResult, UserId, WorkspaceId};

use crate::permission_resolver::PermissionResolver;

/// Held permissions listed in a denial explanation before truncation.
const DENIAL_LISTING_LIMIT: usize = 8;

/// Outcome of an explained permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheck {
    /// Whether the permission is currently held.
    pub granted: bool,
    /// Human-readable reason for the outcome.
    pub explanation: String,
}

/// Application service answering point-in-time permission queries.
#[derive(Clone)]
pub struct AuthorizationService {
    resolver: PermissionResolver,
}

impl AuthorizationService {
    /// Creates the facade over a configured resolver.
    #[must_use]
    pub fn new(resolver: PermissionResolver) -> Self {
        Self { resolver }
    }

    /// Returns whether the user currently holds the permission.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        permission: &str,
    ) -> bool {
        self.resolver
            .resolve_effective_permissions(user_id, workspace_id)
            .await
            .contains(permission)
    }

    /// Returns whether the user holds at least one of the permissions.
    ///
    /// An empty input never grants.
    pub async fn has_any_permission(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        permissions: &[&str],
    ) -> bool {
        if permissions.is_empty() {
            return false;
        }

        let resolved = self
            .resolver
            .resolve_effective_permissions(user_id, workspace_id)
            .await;

        permissions
            .iter()
            .any(|permission| resolved.contains(*permission))
    }

    /// Returns whether the user holds every one of the permissions.
    ///
    /// An empty input is vacuously satisfied.
    pub async fn has_all_permissions(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        permissions: &[&str],
    ) -> bool {
        if permissions.is_empty() {
            return true;
        }

        let resolved = self
            .resolver
            .resolve_effective_permissions(user_id, workspace_id)
            .await;

        permissions
            .iter()
            .all(|permission| resolved.contains(*permission))
    }

    /// Returns the check outcome with a human-readable explanation.
    pub async fn check_permission(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        permission: &str,
    ) -> PermissionCheck {
        let resolved = self
            .resolver
            .resolve_effective_permissions(user_id, workspace_id)
            .await;

        if resolved.contains(permission) {
            return PermissionCheck {
                granted: true,
                explanation: format!(
                    "user '{user_id}' holds '{permission}' in workspace '{workspace_id}'"
                ),
            };
        }

        PermissionCheck {
            granted: false,
            explanation: denial_explanation(permission, &resolved),
        }
    }

    /// Ensures the user holds the permission, failing with `Forbidden`.
    pub async fn require_permission(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        permission: &str,
    ) -> AppResult<()> {
        if self.has_permission(user_id, workspace_id, permission).await {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{user_id}' is missing permission '{permission}' in workspace '{workspace_id}'"
        )))
    }
}

fn denial_explanation(permission: &str, resolved: &BTreeSet<String>) -> String {
    if resolved.is_empty() {
        return format!("'{permission}' is not granted; no permissions are currently held");
    }

    let listed: Vec<&str> = resolved
        .iter()
        .take(DENIAL_LISTING_LIMIT)
        .map(String::as_str)
        .collect();
    let remainder = resolved.len().saturating_sub(DENIAL_LISTING_LIMIT);

    if remainder > 0 {
        format!(
            "'{permission}' is not granted; held permissions: {} (and {remainder} more)",
            listed.join(", ")
        )
    } else {
        format!(
            "'{permission}' is not granted; held permissions: {}",
            listed.join(", ")
        )
    }
}
