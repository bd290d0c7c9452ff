use std::sync::Arc;

use keygate_core::{AppError, AppResult, Clock, NonEmptyString, PermissionId};
use keygate_domain::{Permission, PermissionCode};

use crate::{
    CreatePermissionInput, NewPermission, PagingConfig, PermissionCatalogRepository,
    PermissionQuery, UpdatePermissionInput,
};

const NAME_MAX_LENGTH: usize = 200;
const MODULE_MAX_LENGTH: usize = 64;
const DESCRIPTION_MAX_LENGTH: usize = 1_000;

/// Application service for catalog administration.
#[derive(Clone)]
pub struct PermissionCatalogService {
    repository: Arc<dyn PermissionCatalogRepository>,
    clock: Arc<dyn Clock>,
    paging: PagingConfig,
}

impl PermissionCatalogService {
    /// Creates a new catalog service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PermissionCatalogRepository>,
        clock: Arc<dyn Clock>,
        paging: PagingConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            paging,
        }
    }

    /// Registers a new active permission.
    pub async fn create(&self, input: CreatePermissionInput) -> AppResult<Permission> {
        let code = PermissionCode::new(input.code)?;
        if self
            .repository
            .find_permission_by_code(code.as_str())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "permission code '{code}' already exists"
            )));
        }

        let permission = self
            .repository
            .insert_permission(NewPermission {
                code,
                name: required_text("name", input.name, NAME_MAX_LENGTH)?,
                description: optional_text(
                    "description",
                    input.description,
                    DESCRIPTION_MAX_LENGTH,
                )?,
                module: required_text("module", input.module, MODULE_MAX_LENGTH)?,
                action: required_text("action", input.action, MODULE_MAX_LENGTH)?,
                resource_template: optional_text(
                    "resource_template",
                    input.resource_template,
                    NAME_MAX_LENGTH,
                )?,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            permission_id = %permission.id,
            code = %permission.code,
            "permission registered"
        );
        Ok(permission)
    }

    /// Updates descriptive fields. The code is immutable.
    pub async fn update(
        &self,
        permission_id: PermissionId,
        input: UpdatePermissionInput,
    ) -> AppResult<Permission> {
        let mut permission = self.get(permission_id).await?;

        if let Some(name) = input.name {
            permission.name = required_text("name", name, NAME_MAX_LENGTH)?;
        }
        if let Some(description) = input.description {
            permission.description =
                optional_text("description", Some(description), DESCRIPTION_MAX_LENGTH)?;
        }
        if let Some(module) = input.module {
            permission.module = required_text("module", module, MODULE_MAX_LENGTH)?;
        }
        if let Some(action) = input.action {
            permission.action = required_text("action", action, MODULE_MAX_LENGTH)?;
        }
        if let Some(template) = input.resource_template {
            permission.resource_template =
                optional_text("resource_template", Some(template), NAME_MAX_LENGTH)?;
        }

        permission.updated_at = self.clock.now();
        self.repository.save_permission(permission.clone()).await?;
        Ok(permission)
    }

    /// Deactivates a permission. Edges referencing it are kept but stop granting.
    pub async fn deactivate(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.set_active(permission_id, false).await
    }

    /// Reactivates a previously deactivated permission.
    pub async fn activate(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.set_active(permission_id, true).await
    }

    /// Returns a permission by id.
    pub async fn get(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.repository
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permission {permission_id} not found")))
    }

    /// Returns a permission by exact code when it exists.
    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        self.repository.find_permission_by_code(code.trim()).await
    }

    /// Lists catalog entries. The limit is capped by the paging bounds.
    pub async fn query(&self, query: PermissionQuery) -> AppResult<Vec<Permission>> {
        let limit = self.paging.page_size(Some(query.limit))?;
        self.repository
            .query_permissions(&PermissionQuery { limit, ..query })
            .await
    }

    async fn set_active(&self, permission_id: PermissionId, is_active: bool) -> AppResult<Permission> {
        let mut permission = self.get(permission_id).await?;
        if permission.is_active == is_active {
            return Ok(permission);
        }

        permission.is_active = is_active;
        permission.updated_at = self.clock.now();
        self.repository.save_permission(permission.clone()).await?;

        tracing::info!(
            permission_id = %permission.id,
            code = %permission.code,
            is_active,
            "permission activation changed"
        );
        Ok(permission)
    }
}

fn required_text(field: &str, value: String, max_length: usize) -> AppResult<String> {
    let value = NonEmptyString::new(value.trim())
        .map_err(|_| AppError::Validation(format!("{field} must not be empty")))?;
    ensure_length(field, value.as_str(), max_length)?;
    Ok(value.as_str().to_owned())
}

fn optional_text(
    field: &str,
    value: Option<String>,
    max_length: usize,
) -> AppResult<Option<String>> {
    let Some(value) = value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    ensure_length(field, &value, max_length)?;
    Ok(Some(value))
}

pub(crate) fn ensure_length(field: &str, value: &str, max_length: usize) -> AppResult<()> {
    if value.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max_length} characters"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests;
