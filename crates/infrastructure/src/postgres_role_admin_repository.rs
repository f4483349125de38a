//! PostgreSQL-backed repository for role administration.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use chartfold_application::{AssignRoleInput, CreateRoleInput, RoleAdminRepository};
use chartfold_core::{AppError, AppResult, RoleId, UserId, WorkspaceId};
use chartfold_domain::{PermissionDefinition, Role, RoleAssignment};

/// PostgreSQL implementation of the role administration port.
#[derive(Clone)]
pub struct PostgresRoleAdminRepository {
    pool: PgPool,
}

impl PostgresRoleAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: uuid::Uuid,
    workspace_id: Option<uuid::Uuid>,
    role_name: String,
    level: i32,
    is_active: bool,
    permission: Option<String>,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    role_id: uuid::Uuid,
    assigned_by: uuid::Uuid,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct PermissionDefinitionRow {
    name: String,
    category: String,
    resource_type: String,
    action: String,
    is_system: bool,
    is_active: bool,
}

#[async_trait]
impl RoleAdminRepository for PostgresRoleAdminRepository {
    async fn list_roles(&self, workspace_id: WorkspaceId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.workspace_id,
                roles.name AS role_name,
                roles.level,
                roles.is_active,
                grants.permission
            FROM authz_roles AS roles
            LEFT JOIN authz_role_permissions AS grants
                ON grants.role_id = roles.id
            WHERE roles.workspace_id = $1 OR roles.workspace_id IS NULL
            ORDER BY roles.name, grants.permission
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        Ok(aggregate_roles(rows))
    }

    async fn get_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.workspace_id,
                roles.name AS role_name,
                roles.level,
                roles.is_active,
                grants.permission
            FROM authz_roles AS roles
            LEFT JOIN authz_role_permissions AS grants
                ON grants.role_id = roles.id
            WHERE roles.id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows).into_iter().next())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let role_id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO authz_roles (workspace_id, name, level, is_active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING id
            "#,
        )
        .bind(input.workspace_id.map(|workspace_id| workspace_id.as_uuid()))
        .bind(input.name.trim())
        .bind(input.level)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, input.name.as_str()))?;

        for permission in &input.permissions {
            sqlx::query(
                r#"
                INSERT INTO authz_role_permissions (role_id, permission)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission) DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(Role {
            id: RoleId::from_uuid(role_id),
            workspace_id: input.workspace_id,
            name: input.name.trim().to_owned(),
            level: input.level,
            permissions: input.permissions,
            is_active: true,
        })
    }

    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permissions: BTreeSet<String>,
    ) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.workspace_id,
                roles.name AS role_name,
                roles.level,
                roles.is_active,
                NULL::text AS permission
            FROM authz_roles AS roles
            WHERE roles.id = $1
            FOR UPDATE
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        sqlx::query(
            r#"
            DELETE FROM authz_role_permissions
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear role grants: {error}")))?;

        for permission in &permissions {
            sqlx::query(
                r#"
                INSERT INTO authz_role_permissions (role_id, permission)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission) DO NOTHING
                "#,
            )
            .bind(role_id.as_uuid())
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(Role {
            id: role_id,
            workspace_id: row.workspace_id.map(WorkspaceId::from_uuid),
            name: row.role_name,
            level: row.level,
            permissions,
            is_active: row.is_active,
        })
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let active_holders = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM authz_role_assignments
            WHERE role_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count role holders: {error}")))?;

        if active_holders > 0 {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' is still assigned to {active_holders} holder(s)"
            )));
        }

        sqlx::query(
            r#"
            DELETE FROM authz_role_assignments
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete historical assignments: {error}"))
        })?;

        sqlx::query(
            r#"
            DELETE FROM authz_role_permissions
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role grants: {error}")))?;

        let rows_affected = sqlx::query(
            r#"
            DELETE FROM authz_roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn create_assignment(&self, input: AssignRoleInput) -> AppResult<RoleAssignment> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let role_scope = sqlx::query_scalar::<_, Option<uuid::Uuid>>(
            r#"
            SELECT workspace_id
            FROM authz_roles
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(input.role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve role: {error}")))?
        .ok_or_else(|| {
            AppError::NotFound(format!("role '{}' was not found", input.role_id))
        })?;

        if role_scope.is_some_and(|scope| scope != input.workspace_id.as_uuid()) {
            return Err(AppError::NotFound(format!(
                "role '{}' is not available in workspace '{}'",
                input.role_id, input.workspace_id
            )));
        }

        let assigned_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO authz_role_assignments
                (user_id, workspace_id, role_id, assigned_by, assigned_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, NOW(), $5, TRUE)
            ON CONFLICT (user_id, workspace_id, role_id) DO UPDATE
            SET assigned_by = EXCLUDED.assigned_by,
                assigned_at = NOW(),
                expires_at = EXCLUDED.expires_at,
                is_active = TRUE
            RETURNING assigned_at
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.workspace_id.as_uuid())
        .bind(input.role_id.as_uuid())
        .bind(input.assigned_by.as_uuid())
        .bind(input.expires_at)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist assignment: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(RoleAssignment {
            user_id: input.user_id,
            workspace_id: input.workspace_id,
            role_id: input.role_id,
            assigned_by: input.assigned_by,
            assigned_at,
            expires_at: input.expires_at,
            is_active: true,
        })
    }

    async fn revoke_assignment(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE authz_role_assignments
            SET is_active = FALSE
            WHERE user_id = $1
                AND workspace_id = $2
                AND role_id = $3
                AND is_active = TRUE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(workspace_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke assignment: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "assignment '{user_id}:{role_id}' was not found"
            )));
        }

        Ok(())
    }

    async fn list_assignments(&self, workspace_id: WorkspaceId) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                assignments.user_id,
                assignments.workspace_id,
                assignments.role_id,
                assignments.assigned_by,
                assignments.assigned_at,
                assignments.expires_at,
                assignments.is_active
            FROM authz_role_assignments AS assignments
            WHERE assignments.workspace_id = $1
            ORDER BY assignments.user_id, assignments.assigned_at
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list assignments: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RoleAssignment {
                user_id: UserId::from_uuid(row.user_id),
                workspace_id: WorkspaceId::from_uuid(row.workspace_id),
                role_id: RoleId::from_uuid(row.role_id),
                assigned_by: UserId::from_uuid(row.assigned_by),
                assigned_at: row.assigned_at,
                expires_at: row.expires_at,
                is_active: row.is_active,
            })
            .collect())
    }

    async fn list_permission_definitions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionDefinitionRow>(
            r#"
            SELECT name, category, resource_type, action, is_system, is_active
            FROM authz_permissions
            ORDER BY category, name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list permission definitions: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| PermissionDefinition {
                name: row.name,
                category: row.category,
                resource_type: row.resource_type,
                action: row.action,
                is_system: row.is_system,
                is_active: row.is_active,
            })
            .collect())
    }
}

fn aggregate_roles(rows: Vec<RoleRow>) -> Vec<Role> {
    let mut by_id: HashMap<uuid::Uuid, Role> = HashMap::new();

    for row in rows {
        let role = by_id.entry(row.role_id).or_insert_with(|| Role {
            id: RoleId::from_uuid(row.role_id),
            workspace_id: row.workspace_id.map(WorkspaceId::from_uuid),
            name: row.role_name.clone(),
            level: row.level,
            permissions: BTreeSet::new(),
            is_active: row.is_active,
        });

        if let Some(permission) = row.permission {
            role.permissions.insert(permission);
        }
    }

    let mut roles = by_id.into_values().collect::<Vec<_>>();
    roles.sort_by(|left, right| left.name.cmp(&right.name));
    roles
}

fn map_role_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to create role: {error}"))
}
