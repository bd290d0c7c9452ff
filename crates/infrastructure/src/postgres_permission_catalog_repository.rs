use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use keygate_application::{
    CodeFilter, NewPermission, PermissionCatalogRepository, PermissionQuery,
};
use keygate_core::{AppError, AppResult, PermissionId};
use keygate_domain::{Permission, PermissionCode};

use crate::storage_error::{is_unique_violation, storage_error};

const PERMISSION_COLUMNS: &str = "id, code, name, description, module, action, \
     resource_template, is_active, created_at, updated_at";

/// PostgreSQL-backed permission catalog.
#[derive(Clone)]
pub struct PostgresPermissionCatalogRepository {
    pool: PgPool,
}

impl PostgresPermissionCatalogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    code: String,
    name: String,
    description: Option<String>,
    module: String,
    action: String,
    resource_template: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        let code = PermissionCode::new(row.code.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode permission code '{}' for id {}: {error}",
                row.code, row.id
            ))
        })?;

        Ok(Self {
            id: PermissionId::new(row.id),
            code,
            name: row.name,
            description: row.description,
            module: row.module,
            action: row.action,
            resource_template: row.resource_template,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_rows(rows: Vec<PermissionRow>) -> AppResult<Vec<Permission>> {
    rows.into_iter().map(Permission::try_from).collect()
}

#[async_trait]
impl PermissionCatalogRepository for PostgresPermissionCatalogRepository {
    async fn insert_permission(&self, permission: NewPermission) -> AppResult<Permission> {
        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            r#"
            INSERT INTO permissions (
                code, name, description, module, action, resource_template,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, true, $7, $7)
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(permission.code.as_str())
        .bind(permission.name.as_str())
        .bind(permission.description.as_deref())
        .bind(permission.module.as_str())
        .bind(permission.action.as_str())
        .bind(permission.resource_template.as_deref())
        .bind(permission.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Conflict(format!(
                    "permission code '{}' already exists",
                    permission.code
                ));
            }
            storage_error("insert permission", error)
        })?;

        Permission::try_from(row)
    }

    async fn save_permission(&self, permission: Permission) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET name = $2,
                description = $3,
                module = $4,
                action = $5,
                resource_template = $6,
                is_active = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(permission.id.value())
        .bind(permission.name.as_str())
        .bind(permission.description.as_deref())
        .bind(permission.module.as_str())
        .bind(permission.action.as_str())
        .bind(permission.resource_template.as_deref())
        .bind(permission.is_active)
        .bind(permission.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error("update permission", error))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "permission {} not found",
                permission.id
            )));
        }

        Ok(())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(permission_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_error("load permission", error))?
        .map(Permission::try_from)
        .transpose()
    }

    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_error("load permission by code", error))?
        .map(Permission::try_from)
        .transpose()
    }

    async fn find_permissions(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        if permission_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = permission_ids.iter().map(PermissionId::value).collect();
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("load permissions", error))?;

        decode_rows(rows)
    }

    async fn query_permissions(&self, query: &PermissionQuery) -> AppResult<Vec<Permission>> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE TRUE"
        ));

        if !query.include_inactive {
            builder.push(" AND is_active");
        }
        if let Some(module) = &query.module {
            builder.push(" AND module = ");
            builder.push_bind(module.as_str());
        }
        if let Some(action) = &query.action {
            builder.push(" AND action = ");
            builder.push_bind(action.as_str());
        }
        match &query.code {
            Some(CodeFilter::Exact(code)) => {
                builder.push(" AND code = ");
                builder.push_bind(code.as_str());
            }
            Some(CodeFilter::Prefix(prefix)) => {
                builder.push(" AND starts_with(code, ");
                builder.push_bind(prefix.as_str());
                builder.push(")");
            }
            None => {}
        }

        builder.push(" ORDER BY code LIMIT ");
        builder.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));

        let rows = builder
            .build_query_as::<PermissionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| storage_error("query permissions", error))?;

        decode_rows(rows)
    }
}
