use chartfold_core::{UserId, WorkspaceId};

/// Deterministic cache key layout for resolved permission sets.
///
/// One instance is shared by the resolver and the invalidation coordinator
/// so entry keys and workspace eviction patterns cannot drift apart. Keys
/// lead with the workspace so a single glob evicts a whole tenant.
#[derive(Debug, Clone)]
pub struct PermissionKeySpace {
    prefix: String,
}

impl PermissionKeySpace {
    /// Creates a key space under the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the cache key for one user/workspace pair.
    #[must_use]
    pub fn entry_key(&self, user_id: UserId, workspace_id: WorkspaceId) -> String {
        format!("{}:{workspace_id}:{user_id}", self.prefix)
    }

    /// Returns the glob pattern matching every key in a workspace.
    #[must_use]
    pub fn workspace_pattern(&self, workspace_id: WorkspaceId) -> String {
        format!("{}:{workspace_id}:*", self.prefix)
    }
}

impl Default for PermissionKeySpace {
    fn default() -> Self {
        Self::new("authz:permissions")
    }
}
