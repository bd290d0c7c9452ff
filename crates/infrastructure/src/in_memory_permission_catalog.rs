use std::collections::BTreeMap;

use async_trait::async_trait;
use keygate_application::{NewPermission, PermissionCatalogRepository, PermissionQuery};
use keygate_core::{AppError, AppResult, PermissionId};
use keygate_domain::Permission;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct CatalogState {
    permissions: BTreeMap<PermissionId, Permission>,
    last_id: i64,
}

/// In-memory permission catalog.
#[derive(Debug, Default)]
pub struct InMemoryPermissionCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryPermissionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes an entry outright, leaving any edges that reference it dangling.
    pub async fn purge(&self, permission_id: PermissionId) -> bool {
        self.state
            .write()
            .await
            .permissions
            .remove(&permission_id)
            .is_some()
    }
}

#[async_trait]
impl PermissionCatalogRepository for InMemoryPermissionCatalog {
    async fn insert_permission(&self, permission: NewPermission) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        if state
            .permissions
            .values()
            .any(|existing| existing.code == permission.code)
        {
            return Err(AppError::Conflict(format!(
                "permission code '{}' already exists",
                permission.code
            )));
        }

        state.last_id += 1;
        let stored = Permission {
            id: PermissionId::new(state.last_id),
            code: permission.code,
            name: permission.name,
            description: permission.description,
            module: permission.module,
            action: permission.action,
            resource_template: permission.resource_template,
            is_active: true,
            created_at: permission.created_at,
            updated_at: permission.created_at,
        };
        state.permissions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save_permission(&self, permission: Permission) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(existing) = state.permissions.get_mut(&permission.id) else {
            return Err(AppError::NotFound(format!(
                "permission {} not found",
                permission.id
            )));
        };

        *existing = permission;
        Ok(())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .get(&permission_id)
            .cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .values()
            .find(|permission| permission.code.as_str() == code)
            .cloned())
    }

    async fn find_permissions(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(permission_ids
            .iter()
            .filter_map(|permission_id| state.permissions.get(permission_id).cloned())
            .collect())
    }

    async fn query_permissions(&self, query: &PermissionQuery) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut matching: Vec<Permission> = state
            .permissions
            .values()
            .filter(|permission| query.matches(permission))
            .cloned()
            .collect();
        matching.sort_by(|left, right| left.code.cmp(&right.code));

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}
