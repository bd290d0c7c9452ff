use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keygate_core::{AppResult, PermissionId, RoleId};
use keygate_domain::{EdgeAudit, EdgeOwner, Effect, PermissionEdge};

/// Edge payload written by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeWrite {
    /// Referenced catalog entry.
    pub permission_id: PermissionId,
    /// Grant or deny.
    pub effect: Effect,
    /// Assignment instant; replaces the previous value on re-assignment.
    pub assigned_at: DateTime<Utc>,
    /// Administrator performing the assignment.
    pub assigned_by: String,
    /// Exclusive end of validity.
    pub expires_at: Option<DateTime<Utc>>,
    /// Justification.
    pub reason: Option<String>,
}

impl EdgeWrite {
    /// Builds the stored edge for an owner.
    #[must_use]
    pub fn into_edge(self, owner: EdgeOwner) -> PermissionEdge {
        PermissionEdge {
            owner,
            permission_id: self.permission_id,
            effect: self.effect,
            audit: EdgeAudit {
                assigned_at: self.assigned_at,
                assigned_by: self.assigned_by,
                expires_at: self.expires_at,
                reason: self.reason,
            },
        }
    }
}

/// Whether an upsert created or replaced the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No edge existed for the pair.
    Inserted,
    /// An existing edge was replaced in place.
    Replaced,
}

/// Stored edge returned by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertedEdge {
    /// Edge as persisted.
    pub edge: PermissionEdge,
    /// Insert or replace.
    pub outcome: UpsertOutcome,
}

/// Set of writes against one owner applied as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeBatch {
    /// Edges to upsert.
    pub upserts: Vec<EdgeWrite>,
    /// Permissions whose edges are removed. Absent edges are ignored.
    pub removals: Vec<PermissionId>,
}

impl EdgeBatch {
    /// Returns whether the batch contains no work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Counters reported after a batch commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeBatchResult {
    /// Upserts that created edges.
    pub inserted: usize,
    /// Upserts that replaced edges.
    pub replaced: usize,
    /// Removals that deleted an edge.
    pub removed: usize,
}

/// Repository port for role-owned and user-owned permission edges.
///
/// Implementations keep at most one edge per `(owner, permission_id)` and
/// must never expose a partially written edge to readers.
#[async_trait]
pub trait PermissionEdgeRepository: Send + Sync {
    /// Inserts or replaces the edge for `(owner, edge.permission_id)` atomically.
    async fn upsert_edge(&self, owner: EdgeOwner, edge: EdgeWrite) -> AppResult<UpsertedEdge>;

    /// Deletes the edge for the pair. Returns whether an edge existed.
    async fn delete_edge(&self, owner: EdgeOwner, permission_id: PermissionId) -> AppResult<bool>;

    /// Finds the edge for the pair.
    async fn find_edge(
        &self,
        owner: EdgeOwner,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionEdge>>;

    /// Lists every edge of one owner, expired ones included.
    async fn list_edges(&self, owner: EdgeOwner) -> AppResult<Vec<PermissionEdge>>;

    /// Lists role edges across roles, optionally narrowed to one permission.
    async fn list_role_edges(
        &self,
        role_ids: &[RoleId],
        permission_id: Option<PermissionId>,
    ) -> AppResult<Vec<PermissionEdge>>;

    /// Applies a batch for one owner as a single all-or-nothing unit.
    ///
    /// On error nothing from the batch is visible. Stores that cannot honor
    /// this report `false` from [`Self::supports_atomic_batches`].
    async fn apply_batch(&self, owner: EdgeOwner, batch: EdgeBatch) -> AppResult<EdgeBatchResult>;

    /// Returns whether [`Self::apply_batch`] is all-or-nothing.
    fn supports_atomic_batches(&self) -> bool {
        true
    }
}
