//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod fallback_key_value_cache;
mod in_memory_key_value_cache;
mod in_memory_permission_store;
mod postgres_permission_store;
mod postgres_role_admin_repository;
mod redis_key_value_cache;

pub use fallback_key_value_cache::FallbackKeyValueCache;
pub use in_memory_key_value_cache::InMemoryKeyValueCache;
pub use in_memory_permission_store::InMemoryPermissionStore;
pub use postgres_permission_store::PostgresPermissionStore;
pub use postgres_role_admin_repository::PostgresRoleAdminRepository;
pub use redis_key_value_cache::RedisKeyValueCache;
