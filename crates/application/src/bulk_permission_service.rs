use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use keygate_core::{
    AppError, AppResult, BulkFailureReport, BulkItemFailure, Clock, PermissionId,
};
use keygate_domain::{EdgeOwner, Effect, PermissionEdge};

use crate::permission_assignment_service::{
    ValidatedAudit, validate_owner, validate_permission_id,
};
use crate::{
    EdgeBatch, EdgeBatchResult, EdgeWrite, OwnerLocks, PermissionCatalogRepository,
    PermissionEdgeRepository, UpsertOutcome,
};

/// Input payload for assigning many permissions to one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAssignInput {
    /// Catalog entries to link. Duplicates are collapsed.
    pub permission_ids: Vec<PermissionId>,
    /// Effect applied to every item.
    pub effect: Effect,
    /// Expiry applied to every item.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator performing the assignment.
    pub assigned_by: String,
    /// Justification applied to every item.
    pub reason: Option<String>,
}

/// Counts reported by bulk operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Edges created.
    pub added: usize,
    /// Existing edges replaced.
    pub updated: usize,
    /// Edges deleted.
    pub removed: usize,
    /// Requested items that needed no write.
    pub unchanged: usize,
}

impl From<EdgeBatchResult> for BulkOutcome {
    fn from(result: EdgeBatchResult) -> Self {
        Self {
            added: result.inserted,
            updated: result.replaced,
            removed: result.removed,
            unchanged: 0,
        }
    }
}

/// Application service for multi-edge writes against one owner.
///
/// Every operation holds the owner's lock for its whole read-compute-write
/// cycle and commits through a single batch when the store allows it.
#[derive(Clone)]
pub struct BulkPermissionService {
    catalog: Arc<dyn PermissionCatalogRepository>,
    edges: Arc<dyn PermissionEdgeRepository>,
    clock: Arc<dyn Clock>,
    locks: Arc<OwnerLocks>,
}

impl BulkPermissionService {
    /// Creates a new bulk service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PermissionCatalogRepository>,
        edges: Arc<dyn PermissionEdgeRepository>,
        clock: Arc<dyn Clock>,
        locks: Arc<OwnerLocks>,
    ) -> Self {
        Self {
            catalog,
            edges,
            clock,
            locks,
        }
    }

    /// Upserts one edge per permission with shared effect and audit fields.
    pub async fn bulk_assign(
        &self,
        owner: EdgeOwner,
        input: BulkAssignInput,
    ) -> AppResult<BulkOutcome> {
        validate_owner(owner)?;
        let permission_ids = distinct_ids(input.permission_ids, false)?;
        let now = self.clock.now();
        let audit = ValidatedAudit::new(input.assigned_by, input.expires_at, input.reason, now)?;
        self.ensure_permissions_exist(&permission_ids).await?;

        let upserts = permission_ids
            .iter()
            .map(|permission_id| EdgeWrite {
                permission_id: *permission_id,
                effect: input.effect,
                assigned_at: now,
                assigned_by: audit.assigned_by.clone(),
                expires_at: audit.expires_at,
                reason: audit.reason.clone(),
            })
            .collect();

        let _guard = self.locks.acquire(owner).await;
        let outcome = BulkOutcome::from(
            self.apply(
                owner,
                EdgeBatch {
                    upserts,
                    removals: Vec::new(),
                },
            )
            .await?,
        );

        tracing::info!(owner = %owner, added = outcome.added, updated = outcome.updated, "bulk assign applied");
        Ok(outcome)
    }

    /// Deletes the owner's edges for the permissions. Absent edges count as unchanged.
    pub async fn bulk_remove(
        &self,
        owner: EdgeOwner,
        permission_ids: Vec<PermissionId>,
    ) -> AppResult<BulkOutcome> {
        validate_owner(owner)?;
        let permission_ids = distinct_ids(permission_ids, false)?;
        let requested = permission_ids.len();

        let _guard = self.locks.acquire(owner).await;
        let result = self
            .apply(
                owner,
                EdgeBatch {
                    upserts: Vec::new(),
                    removals: permission_ids,
                },
            )
            .await?;

        let outcome = BulkOutcome {
            unchanged: requested.saturating_sub(result.removed),
            ..BulkOutcome::from(result)
        };
        tracing::info!(owner = %owner, removed = outcome.removed, "bulk remove applied");
        Ok(outcome)
    }

    /// Makes the owner's edge set exactly the given permissions.
    ///
    /// Missing permissions are added as grants without expiry. Edges outside
    /// the set are deleted. Live grants without expiry are left untouched;
    /// expired, expiring or denying edges on desired ids are replaced.
    pub async fn sync(
        &self,
        owner: EdgeOwner,
        permission_ids: Vec<PermissionId>,
        assigned_by: &str,
    ) -> AppResult<BulkOutcome> {
        validate_owner(owner)?;
        let permission_ids = distinct_ids(permission_ids, true)?;
        let now = self.clock.now();
        let audit = ValidatedAudit::new(assigned_by.to_owned(), None, None, now)?;
        self.ensure_permissions_exist(&permission_ids).await?;

        let desired = permission_ids
            .into_iter()
            .map(|permission_id| {
                let write = EdgeWrite {
                    permission_id,
                    effect: Effect::Grant,
                    assigned_at: now,
                    assigned_by: audit.assigned_by.clone(),
                    expires_at: None,
                    reason: None,
                };
                (permission_id, write)
            })
            .collect();

        self.sync_edges(owner, desired, now).await
    }

    /// Replaces the target's edge set with the source's live edges.
    ///
    /// Owners must be of the same kind and distinct. New target edges keep
    /// the source edge's effect, expiry and reason. Dangling and expired
    /// source edges are not copied. Target edges that are live with the same
    /// effect and expiry are left untouched; others are replaced.
    pub async fn copy(
        &self,
        source: EdgeOwner,
        target: EdgeOwner,
        assigned_by: &str,
    ) -> AppResult<BulkOutcome> {
        validate_owner(source)?;
        validate_owner(target)?;
        if source.kind() != target.kind() {
            return Err(AppError::Validation(format!(
                "cannot copy permissions from {source} to {target}: owner kinds differ"
            )));
        }
        if source == target {
            return Err(AppError::Validation(format!(
                "cannot copy permissions of {source} onto itself"
            )));
        }
        let now = self.clock.now();
        let audit = ValidatedAudit::new(assigned_by.to_owned(), None, None, now)?;

        let live_edges: Vec<_> = self
            .edges
            .list_edges(source)
            .await?
            .into_iter()
            .filter(|edge| edge.is_active_at(now))
            .collect();
        let permission_ids: Vec<PermissionId> =
            live_edges.iter().map(|edge| edge.permission_id).collect();
        let existing: HashSet<PermissionId> = self
            .catalog
            .find_permissions(&permission_ids)
            .await?
            .into_iter()
            .map(|permission| permission.id)
            .collect();

        let desired: BTreeMap<PermissionId, EdgeWrite> = live_edges
            .into_iter()
            .filter(|edge| existing.contains(&edge.permission_id))
            .map(|edge| {
                let write = EdgeWrite {
                    permission_id: edge.permission_id,
                    effect: edge.effect,
                    assigned_at: now,
                    assigned_by: audit.assigned_by.clone(),
                    expires_at: edge.audit.expires_at,
                    reason: edge.audit.reason,
                };
                (edge.permission_id, write)
            })
            .collect();

        if desired.is_empty() {
            tracing::warn!(
                source = %source,
                target = %target,
                "copy source holds no live permissions; target will be cleared"
            );
        }

        self.sync_edges(target, desired, now).await
    }

    async fn sync_edges(
        &self,
        owner: EdgeOwner,
        mut desired: BTreeMap<PermissionId, EdgeWrite>,
        now: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let _guard = self.locks.acquire(owner).await;
        let current = self.edges.list_edges(owner).await?;

        let mut unchanged = 0;
        let mut removals = Vec::new();
        for edge in current {
            let applied = desired
                .get(&edge.permission_id)
                .map(|write| already_applied(&edge, write, now));
            match applied {
                Some(true) => {
                    desired.remove(&edge.permission_id);
                    unchanged += 1;
                }
                Some(false) => {}
                None => removals.push(edge.permission_id),
            }
        }
        let batch = EdgeBatch {
            upserts: desired.into_values().collect(),
            removals,
        };

        if batch.is_empty() {
            return Ok(BulkOutcome {
                unchanged,
                ..BulkOutcome::default()
            });
        }

        let outcome = BulkOutcome {
            unchanged,
            ..BulkOutcome::from(self.apply(owner, batch).await?)
        };
        tracing::info!(
            owner = %owner,
            added = outcome.added,
            updated = outcome.updated,
            removed = outcome.removed,
            unchanged = outcome.unchanged,
            "edge set synchronized"
        );
        Ok(outcome)
    }

    async fn apply(&self, owner: EdgeOwner, batch: EdgeBatch) -> AppResult<EdgeBatchResult> {
        if self.edges.supports_atomic_batches() {
            return self
                .edges
                .apply_batch(owner, batch)
                .await
                .inspect_err(|error| {
                    tracing::warn!(owner = %owner, error = %error, "bulk write rolled back");
                });
        }

        self.apply_item_by_item(owner, batch).await
    }

    async fn apply_item_by_item(
        &self,
        owner: EdgeOwner,
        batch: EdgeBatch,
    ) -> AppResult<EdgeBatchResult> {
        let mut result = EdgeBatchResult::default();
        let mut report = BulkFailureReport::default();

        for permission_id in batch.removals {
            match self.edges.delete_edge(owner, permission_id).await {
                Ok(removed) => {
                    result.removed += usize::from(removed);
                    report.succeeded.push(permission_id);
                }
                Err(error) => report.failed.push(BulkItemFailure {
                    permission_id,
                    message: error.to_string(),
                }),
            }
        }

        for write in batch.upserts {
            let permission_id = write.permission_id;
            match self.edges.upsert_edge(owner, write).await {
                Ok(upserted) => {
                    match upserted.outcome {
                        UpsertOutcome::Inserted => result.inserted += 1,
                        UpsertOutcome::Replaced => result.replaced += 1,
                    }
                    report.succeeded.push(permission_id);
                }
                Err(error) => report.failed.push(BulkItemFailure {
                    permission_id,
                    message: error.to_string(),
                }),
            }
        }

        if report.failed.is_empty() {
            return Ok(result);
        }

        tracing::warn!(
            owner = %owner,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk write partially applied"
        );
        Err(AppError::PartialBulkFailure(report))
    }

    async fn ensure_permissions_exist(&self, permission_ids: &[PermissionId]) -> AppResult<()> {
        if permission_ids.is_empty() {
            return Ok(());
        }

        let found: HashSet<PermissionId> = self
            .catalog
            .find_permissions(permission_ids)
            .await?
            .into_iter()
            .map(|permission| permission.id)
            .collect();
        let missing: Vec<String> = permission_ids
            .iter()
            .filter(|permission_id| !found.contains(*permission_id))
            .map(ToString::to_string)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(AppError::NotFound(format!(
            "unknown permission ids: {}",
            missing.join(", ")
        )))
    }
}

/// Whether a stored edge is live and already carries the desired write.
fn already_applied(edge: &PermissionEdge, write: &EdgeWrite, now: DateTime<Utc>) -> bool {
    edge.is_active_at(now) && edge.effect == write.effect && edge.expires_at() == write.expires_at
}

fn distinct_ids(permission_ids: Vec<PermissionId>, allow_empty: bool) -> AppResult<Vec<PermissionId>> {
    if permission_ids.is_empty() && !allow_empty {
        return Err(AppError::Validation(
            "at least one permission id is required".to_owned(),
        ));
    }

    let distinct: BTreeSet<PermissionId> = permission_ids.into_iter().collect();
    for permission_id in &distinct {
        validate_permission_id(*permission_id)?;
    }

    Ok(distinct.into_iter().collect())
}
