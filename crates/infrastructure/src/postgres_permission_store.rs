//! PostgreSQL-backed permission store for resolution reads.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use chartfold_application::{PermissionQueries, RoleHolder};
use chartfold_core::{AppError, AppResult, RoleId, UserId, WorkspaceId};

/// PostgreSQL implementation of the resolution query port.
///
/// The aggregate and view queries depend on server-side precomputations
/// (a maintained aggregate table and a flattened view); when either
/// relation has not been provisioned the query fails as unavailable and
/// the resolver falls through to the manual join, which only needs the
/// base tables.
#[derive(Clone)]
pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionNameRow {
    permission: String,
}

#[derive(Debug, FromRow)]
struct RoleHolderRow {
    user_id: uuid::Uuid,
    workspace_id: uuid::Uuid,
}

#[async_trait]
impl PermissionQueries for PostgresPermissionStore {
    async fn effective_permissions_aggregate(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        let aggregate = sqlx::query_scalar::<_, Vec<String>>(
            r#"
            SELECT permissions
            FROM authz_effective_permission_aggregates
            WHERE user_id = $1 AND workspace_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(workspace_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_query_unavailable(error, "effective permission aggregate"))?;

        Ok(aggregate.unwrap_or_default())
    }

    async fn effective_permissions_view(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        let rows = sqlx::query_as::<_, PermissionNameRow>(
            r#"
            SELECT DISTINCT permission
            FROM authz_effective_permissions_view
            WHERE user_id = $1 AND workspace_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_query_unavailable(error, "effective permission view"))?;

        Ok(rows.into_iter().map(|row| row.permission).collect())
    }

    async fn effective_permissions_join(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        let rows = sqlx::query_as::<_, PermissionNameRow>(
            r#"
            SELECT DISTINCT grants.permission
            FROM authz_role_assignments AS assignments
            INNER JOIN authz_roles AS roles
                ON roles.id = assignments.role_id
            INNER JOIN authz_role_permissions AS grants
                ON grants.role_id = roles.id
            WHERE assignments.user_id = $1
                AND assignments.workspace_id = $2
                AND assignments.is_active = TRUE
                AND (assignments.expires_at IS NULL OR assignments.expires_at > NOW())
                AND roles.is_active = TRUE
                AND (roles.workspace_id IS NULL OR roles.workspace_id = assignments.workspace_id)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to join effective permissions: {error}"))
        })?;

        Ok(rows.into_iter().map(|row| row.permission).collect())
    }

    async fn active_assignments_for_role(&self, role_id: RoleId) -> AppResult<Vec<RoleHolder>> {
        let rows = sqlx::query_as::<_, RoleHolderRow>(
            r#"
            SELECT DISTINCT assignments.user_id, assignments.workspace_id
            FROM authz_role_assignments AS assignments
            WHERE assignments.role_id = $1
                AND assignments.is_active = TRUE
                AND (assignments.expires_at IS NULL OR assignments.expires_at > NOW())
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to list role holders: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| RoleHolder {
                user_id: UserId::from_uuid(row.user_id),
                workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            })
            .collect())
    }
}

/// SQLSTATE 42P01 means the optimized relation was never provisioned; the
/// resolver treats that the same as a transient store failure.
fn map_query_unavailable(error: sqlx::Error, relation: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("42P01")
    {
        return AppError::Unavailable(format!("{relation} is not provisioned"));
    }

    AppError::Unavailable(format!("failed to query {relation}: {error}"))
}
