use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use keygate_core::{AppError, AppResult, PermissionId, RoleId, UserId};
use keygate_domain::{
    EdgeAudit, EdgeOwner, Effect, Permission, PermissionCode, PermissionEdge, RoleMembership,
};
use tokio::sync::Mutex;

use crate::{
    EdgeBatch, EdgeBatchResult, EdgeWrite, NewPermission, PermissionCatalogRepository,
    PermissionEdgeRepository, PermissionQuery, RoleMembershipProvider, UpsertOutcome,
    UpsertedEdge,
};

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

pub(crate) fn permission(id: i64, code: &str, module: &str) -> Permission {
    Permission {
        id: PermissionId::new(id),
        code: PermissionCode::new(code).unwrap_or_else(|_| unreachable!()),
        name: format!("{code} name"),
        description: None,
        module: module.to_owned(),
        action: code.rsplit('.').next().unwrap_or_default().to_owned(),
        resource_template: None,
        is_active: true,
        created_at: base_time() - Duration::days(30),
        updated_at: base_time() - Duration::days(30),
    }
}

pub(crate) fn edge(
    owner: EdgeOwner,
    permission_id: i64,
    effect: Effect,
    expires_at: Option<DateTime<Utc>>,
) -> PermissionEdge {
    PermissionEdge {
        owner,
        permission_id: PermissionId::new(permission_id),
        effect,
        audit: EdgeAudit {
            assigned_at: base_time() - Duration::days(1),
            assigned_by: "seed".to_owned(),
            expires_at,
            reason: None,
        },
    }
}

pub(crate) fn membership(user_id: i64, role_id: i64, role_is_active: bool) -> RoleMembership {
    RoleMembership {
        user_id: UserId::new(user_id),
        role_id: RoleId::new(role_id),
        role_name: format!("role-{role_id}"),
        role_is_active,
        expires_at: None,
    }
}

fn take_failure(counter: &AtomicUsize) -> AppResult<()> {
    if counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
            remaining.checked_sub(1)
        })
        .is_ok()
    {
        return Err(AppError::StorageUnavailable(
            "simulated connection loss".to_owned(),
        ));
    }

    Ok(())
}

#[derive(Default)]
pub(crate) struct FakeCatalog {
    permissions: Mutex<Vec<Permission>>,
    unavailable_reads: AtomicUsize,
}

impl FakeCatalog {
    pub(crate) fn with(permissions: Vec<Permission>) -> Self {
        Self {
            permissions: Mutex::new(permissions),
            unavailable_reads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.unavailable_reads.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionCatalogRepository for FakeCatalog {
    async fn insert_permission(&self, permission: NewPermission) -> AppResult<Permission> {
        let mut permissions = self.permissions.lock().await;
        if permissions
            .iter()
            .any(|existing| existing.code == permission.code)
        {
            return Err(AppError::Conflict(format!(
                "permission code '{}' already exists",
                permission.code
            )));
        }

        let next_id = permissions
            .iter()
            .map(|existing| existing.id.value())
            .max()
            .unwrap_or_default()
            + 1;
        let stored = Permission {
            id: PermissionId::new(next_id),
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
        permissions.push(stored.clone());
        Ok(stored)
    }

    async fn save_permission(&self, permission: Permission) -> AppResult<()> {
        let mut permissions = self.permissions.lock().await;
        let Some(existing) = permissions
            .iter_mut()
            .find(|existing| existing.id == permission.id)
        else {
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
        take_failure(&self.unavailable_reads)?;
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .find(|permission| permission.id == permission_id)
            .cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        take_failure(&self.unavailable_reads)?;
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .find(|permission| permission.code.as_str() == code)
            .cloned())
    }

    async fn find_permissions(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        take_failure(&self.unavailable_reads)?;
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|permission| permission_ids.contains(&permission.id))
            .cloned()
            .collect())
    }

    async fn query_permissions(&self, query: &PermissionQuery) -> AppResult<Vec<Permission>> {
        let mut matching: Vec<Permission> = self
            .permissions
            .lock()
            .await
            .iter()
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

#[derive(Default)]
pub(crate) struct FakeEdges {
    edges: Mutex<HashMap<(EdgeOwner, PermissionId), PermissionEdge>>,
    rejected_permission: Option<PermissionId>,
    non_atomic: bool,
    unavailable_reads: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl FakeEdges {
    pub(crate) fn rejecting(permission_id: i64, non_atomic: bool) -> Self {
        Self {
            rejected_permission: Some(PermissionId::new(permission_id)),
            non_atomic,
            ..Self::default()
        }
    }

    pub(crate) async fn seed(&self, edges: Vec<PermissionEdge>) {
        let mut stored = self.edges.lock().await;
        for edge in edges {
            stored.insert((edge.owner, edge.permission_id), edge);
        }
    }

    pub(crate) async fn snapshot(&self, owner: EdgeOwner) -> Vec<PermissionEdge> {
        let mut edges: Vec<PermissionEdge> = self
            .edges
            .lock()
            .await
            .values()
            .filter(|edge| edge.owner == owner)
            .cloned()
            .collect();
        edges.sort_by_key(|edge| edge.permission_id);
        edges
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.unavailable_reads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn check_writable(&self, permission_id: PermissionId) -> AppResult<()> {
        if self.rejected_permission == Some(permission_id) {
            return Err(AppError::Internal(format!(
                "write rejected for permission {permission_id}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl PermissionEdgeRepository for FakeEdges {
    async fn upsert_edge(&self, owner: EdgeOwner, edge: EdgeWrite) -> AppResult<UpsertedEdge> {
        self.check_writable(edge.permission_id)?;
        let edge = edge.into_edge(owner);
        let previous = self
            .edges
            .lock()
            .await
            .insert((owner, edge.permission_id), edge.clone());

        Ok(UpsertedEdge {
            edge,
            outcome: if previous.is_some() {
                UpsertOutcome::Replaced
            } else {
                UpsertOutcome::Inserted
            },
        })
    }

    async fn delete_edge(&self, owner: EdgeOwner, permission_id: PermissionId) -> AppResult<bool> {
        self.check_writable(permission_id)?;
        Ok(self
            .edges
            .lock()
            .await
            .remove(&(owner, permission_id))
            .is_some())
    }

    async fn find_edge(
        &self,
        owner: EdgeOwner,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionEdge>> {
        take_failure(&self.unavailable_reads)?;
        Ok(self.edges.lock().await.get(&(owner, permission_id)).cloned())
    }

    async fn list_edges(&self, owner: EdgeOwner) -> AppResult<Vec<PermissionEdge>> {
        take_failure(&self.unavailable_reads)?;
        Ok(self.snapshot(owner).await)
    }

    async fn list_role_edges(
        &self,
        role_ids: &[RoleId],
        permission_id: Option<PermissionId>,
    ) -> AppResult<Vec<PermissionEdge>> {
        take_failure(&self.unavailable_reads)?;
        Ok(self
            .edges
            .lock()
            .await
            .values()
            .filter(|edge| match edge.owner {
                EdgeOwner::Role(role_id) => role_ids.contains(&role_id),
                EdgeOwner::User(_) => false,
            })
            .filter(|edge| permission_id.is_none_or(|id| edge.permission_id == id))
            .cloned()
            .collect())
    }

    async fn apply_batch(&self, owner: EdgeOwner, batch: EdgeBatch) -> AppResult<EdgeBatchResult> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut edges = self.edges.lock().await;
        let mut staged = edges.clone();
        let mut result = EdgeBatchResult::default();

        for permission_id in batch.removals {
            self.check_writable(permission_id)?;
            if staged.remove(&(owner, permission_id)).is_some() {
                result.removed += 1;
            }
        }
        for write in batch.upserts {
            self.check_writable(write.permission_id)?;
            let edge = write.into_edge(owner);
            match staged.insert((owner, edge.permission_id), edge) {
                Some(_) => result.replaced += 1,
                None => result.inserted += 1,
            }
        }

        *edges = staged;
        Ok(result)
    }

    fn supports_atomic_batches(&self) -> bool {
        !self.non_atomic
    }
}

#[derive(Default)]
pub(crate) struct FakeMemberships {
    memberships: Mutex<HashMap<UserId, Vec<RoleMembership>>>,
    unavailable_reads: AtomicUsize,
}

impl FakeMemberships {
    pub(crate) fn with(memberships: Vec<RoleMembership>) -> Self {
        let mut by_user: HashMap<UserId, Vec<RoleMembership>> = HashMap::new();
        for membership in memberships {
            by_user.entry(membership.user_id).or_default().push(membership);
        }

        Self {
            memberships: Mutex::new(by_user),
            unavailable_reads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.unavailable_reads.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoleMembershipProvider for FakeMemberships {
    async fn list_role_memberships(&self, user_id: UserId) -> AppResult<Vec<RoleMembership>> {
        take_failure(&self.unavailable_reads)?;
        Ok(self
            .memberships
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
