use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use keygate_core::{AppError, AppResult, Clock, PermissionId};
use keygate_domain::{EdgeOwner, Effect, PermissionCode, PermissionEdge};

use crate::permission_catalog_service::ensure_length;
use crate::{
    EdgeWrite, OwnerLocks, PagingConfig, PermissionCatalogRepository, PermissionEdgeRepository,
    UpsertOutcome,
};

mod listing;

const REASON_MAX_LENGTH: usize = 500;
const ASSIGNED_BY_MAX_LENGTH: usize = 200;

/// Input payload for assigning one permission to an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignPermissionInput {
    /// Catalog entry to link.
    pub permission_id: PermissionId,
    /// Grant or deny.
    pub effect: Effect,
    /// Exclusive end of validity. Must lie in the future.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator performing the assignment.
    pub assigned_by: String,
    /// Optional justification.
    pub reason: Option<String>,
}

/// Edge stored by an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentResult {
    /// Edge as persisted.
    pub edge: PermissionEdge,
    /// Whether a previous edge was replaced.
    pub outcome: UpsertOutcome,
}

/// Ordering of edge listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeSort {
    /// Most recent assignment first.
    #[default]
    NewestFirst,
    /// Alphabetical by permission code. Dangling edges sort last.
    Code,
}

/// Filters and paging for listing one owner's edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeListQuery {
    /// 1-based page number.
    pub page: usize,
    /// Page size; the configured default applies when absent.
    pub page_size: Option<usize>,
    /// Keep only edges whose permission belongs to the module.
    pub module: Option<String>,
    /// Keep only edges with this effect.
    pub effect: Option<Effect>,
    /// Keep only edges whose permission code starts with the prefix.
    pub code_prefix: Option<String>,
    /// Whether expired edges are listed.
    pub include_expired: bool,
    /// Result ordering.
    pub sort: EdgeSort,
}

impl Default for EdgeListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
            module: None,
            effect: None,
            code_prefix: None,
            include_expired: false,
            sort: EdgeSort::default(),
        }
    }
}

/// Catalog metadata joined onto a listed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSummary {
    /// Permission code.
    pub code: PermissionCode,
    /// Permission name.
    pub name: String,
    /// Functional module.
    pub module: String,
    /// Action within the module.
    pub action: String,
    /// Whether the permission is active.
    pub is_active: bool,
}

/// Listed edge with catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    /// Edge owner.
    pub owner: EdgeOwner,
    /// Referenced permission id.
    pub permission_id: PermissionId,
    /// Grant or deny.
    pub effect: Effect,
    /// Assignment instant.
    pub assigned_at: DateTime<Utc>,
    /// Administrator who assigned the edge.
    pub assigned_by: String,
    /// Exclusive end of validity.
    pub expires_at: Option<DateTime<Utc>>,
    /// Justification.
    pub reason: Option<String>,
    /// Whether the edge had lapsed at listing time.
    pub is_expired: bool,
    /// Catalog metadata; `None` for a dangling reference.
    pub permission: Option<PermissionSummary>,
}

/// One page of an owner's edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgePage {
    /// Edges on this page.
    pub items: Vec<EdgeView>,
    /// Matching edges across all pages.
    pub total: usize,
    /// 1-based page number.
    pub page: usize,
    /// Page size applied.
    pub page_size: usize,
}

/// Application service for single-edge administration.
#[derive(Clone)]
pub struct PermissionAssignmentService {
    catalog: Arc<dyn PermissionCatalogRepository>,
    edges: Arc<dyn PermissionEdgeRepository>,
    clock: Arc<dyn Clock>,
    paging: PagingConfig,
    locks: Arc<OwnerLocks>,
}

impl PermissionAssignmentService {
    /// Creates a new assignment service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PermissionCatalogRepository>,
        edges: Arc<dyn PermissionEdgeRepository>,
        clock: Arc<dyn Clock>,
        paging: PagingConfig,
        locks: Arc<OwnerLocks>,
    ) -> Self {
        Self {
            catalog,
            edges,
            clock,
            paging,
            locks,
        }
    }

    /// Creates or replaces the edge between an owner and a permission.
    pub async fn assign(
        &self,
        owner: EdgeOwner,
        input: AssignPermissionInput,
    ) -> AppResult<AssignmentResult> {
        validate_owner(owner)?;
        validate_permission_id(input.permission_id)?;
        let now = self.clock.now();
        let audit = ValidatedAudit::new(input.assigned_by, input.expires_at, input.reason, now)?;

        let permission = self
            .catalog
            .find_permission(input.permission_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission {} not found", input.permission_id))
            })?;
        if !permission.is_active {
            tracing::warn!(
                owner = %owner,
                code = %permission.code,
                "assigning inactive permission; the edge stays inert until reactivation"
            );
        }

        let _guard = self.locks.acquire(owner).await;
        let upserted = self
            .edges
            .upsert_edge(owner, audit.into_write(input.permission_id, input.effect, now))
            .await?;

        tracing::info!(
            owner = %owner,
            code = %permission.code,
            effect = input.effect.as_str(),
            outcome = ?upserted.outcome,
            "permission edge assigned"
        );
        Ok(AssignmentResult {
            edge: upserted.edge,
            outcome: upserted.outcome,
        })
    }

    /// Removes the edge between an owner and a permission.
    ///
    /// Returns `false` when no edge existed.
    pub async fn remove(&self, owner: EdgeOwner, permission_id: PermissionId) -> AppResult<bool> {
        validate_owner(owner)?;
        validate_permission_id(permission_id)?;

        let _guard = self.locks.acquire(owner).await;
        let removed = self.edges.delete_edge(owner, permission_id).await?;
        if removed {
            tracing::info!(owner = %owner, permission_id = %permission_id, "permission edge removed");
        }

        Ok(removed)
    }
}

/// Audit fields validated against the current instant.
pub(crate) struct ValidatedAudit {
    pub(crate) assigned_by: String,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) reason: Option<String>,
}

impl ValidatedAudit {
    pub(crate) fn new(
        assigned_by: String,
        expires_at: Option<DateTime<Utc>>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let assigned_by = assigned_by.trim().to_owned();
        if assigned_by.is_empty() {
            return Err(AppError::Validation(
                "assigned_by must not be empty".to_owned(),
            ));
        }
        ensure_length("assigned_by", &assigned_by, ASSIGNED_BY_MAX_LENGTH)?;

        if let Some(expires_at) = expires_at
            && expires_at <= now
        {
            return Err(AppError::Validation(format!(
                "expires_at {} must be in the future",
                expires_at.to_rfc3339()
            )));
        }

        let reason = reason
            .map(|reason| reason.trim().to_owned())
            .filter(|reason| !reason.is_empty());
        if let Some(reason) = reason.as_deref() {
            ensure_length("reason", reason, REASON_MAX_LENGTH)?;
        }

        Ok(Self {
            assigned_by,
            expires_at,
            reason,
        })
    }

    pub(crate) fn into_write(
        self,
        permission_id: PermissionId,
        effect: Effect,
        assigned_at: DateTime<Utc>,
    ) -> EdgeWrite {
        EdgeWrite {
            permission_id,
            effect,
            assigned_at,
            assigned_by: self.assigned_by,
            expires_at: self.expires_at,
            reason: self.reason,
        }
    }
}

pub(crate) fn validate_owner(owner: EdgeOwner) -> AppResult<()> {
    if owner.id_value() <= 0 {
        return Err(AppError::Validation(format!(
            "owner id must be positive, got {owner}"
        )));
    }

    Ok(())
}

pub(crate) fn validate_permission_id(permission_id: PermissionId) -> AppResult<()> {
    if permission_id.value() <= 0 {
        return Err(AppError::Validation(format!(
            "permission id must be positive, got {permission_id}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests;
