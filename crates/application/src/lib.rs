//! Application services and ports for workspace-scoped authorization.

#![forbid(unsafe_code)]

mod authorization_ports;
mod authorization_service;
mod invalidation_coordinator;
mod permission_resolver;
mod role_admin_service;

pub use authorization_ports::{
    AssignRoleInput, CreateRoleInput, KeyValueCache, PermissionQueries, RoleAdminRepository,
    RoleHolder,
};
pub use authorization_service::{AuthorizationService, PermissionCheck};
pub use invalidation_coordinator::InvalidationCoordinator;
pub use permission_resolver::{
    AggregateStrategy, ManualJoinStrategy, PermissionKeySpace, PermissionResolver,
    ProjectedViewStrategy, ResolutionStrategy, ResolverConfig,
};
pub use role_admin_service::RoleAdminService;
