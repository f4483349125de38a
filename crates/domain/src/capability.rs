//! Well-known capability names enforced by application policy checks.
//!
//! Roles bundle free-form capability strings; these constants cover the
//! gates the platform itself evaluates. Workspace administrators may define
//! further names without touching this list.

/// Allows viewing dashboards in a workspace.
pub const DASHBOARD_READ: &str = "dashboard.read";

/// Allows creating and editing dashboards.
pub const DASHBOARD_WRITE: &str = "dashboard.write";

/// Allows viewing chart definitions.
pub const CHART_READ: &str = "chart.read";

/// Allows creating and editing chart definitions.
pub const CHART_WRITE: &str = "chart.write";

/// Allows creating report exports.
pub const EXPORT_CREATE: &str = "export.create";

/// Allows managing roles and role assignments.
pub const ROLE_MANAGE: &str = "security.role.manage";

/// Allows workspace-wide administrative operations.
pub const WORKSPACE_ADMIN: &str = "workspace.admin";
