//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod capability;
mod security;

pub use capability::{
    CHART_READ, CHART_WRITE, DASHBOARD_READ, DASHBOARD_WRITE, EXPORT_CREATE, ROLE_MANAGE,
    WORKSPACE_ADMIN,
};
pub use security::{
    PermissionDefinition, Role, RoleAssignment, effective_permission_union,
};
