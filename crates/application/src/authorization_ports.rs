//! Ports consumed by the authorization services.

mod admin;
mod cache;
mod store;

pub use admin::{AssignRoleInput, CreateRoleInput, RoleAdminRepository};
pub use cache::KeyValueCache;
pub use store::{PermissionQueries, RoleHolder};
