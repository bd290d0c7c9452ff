use std::collections::HashMap;

use async_trait::async_trait;
use keygate_application::{
    EdgeBatch, EdgeBatchResult, EdgeWrite, PermissionEdgeRepository, UpsertOutcome, UpsertedEdge,
};
use keygate_core::{AppResult, PermissionId, RoleId};
use keygate_domain::{EdgeOwner, PermissionEdge};
use tokio::sync::RwLock;

/// In-memory store for role-owned and user-owned permission edges.
///
/// Every write happens under one write lock, so readers observe a batch
/// either entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryPermissionEdgeRepository {
    edges: RwLock<HashMap<(EdgeOwner, PermissionId), PermissionEdge>>,
}

impl InMemoryPermissionEdgeRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut edges: Vec<PermissionEdge>) -> Vec<PermissionEdge> {
    edges.sort_by_key(|edge| (edge.owner.id_value(), edge.permission_id));
    edges
}

#[async_trait]
impl PermissionEdgeRepository for InMemoryPermissionEdgeRepository {
    async fn upsert_edge(&self, owner: EdgeOwner, edge: EdgeWrite) -> AppResult<UpsertedEdge> {
        let edge = edge.into_edge(owner);
        let previous = self
            .edges
            .write()
            .await
            .insert((owner, edge.permission_id), edge.clone());

        Ok(UpsertedEdge {
            edge,
            outcome: match previous {
                Some(_) => UpsertOutcome::Replaced,
                None => UpsertOutcome::Inserted,
            },
        })
    }

    async fn delete_edge(&self, owner: EdgeOwner, permission_id: PermissionId) -> AppResult<bool> {
        Ok(self
            .edges
            .write()
            .await
            .remove(&(owner, permission_id))
            .is_some())
    }

    async fn find_edge(
        &self,
        owner: EdgeOwner,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionEdge>> {
        Ok(self.edges.read().await.get(&(owner, permission_id)).cloned())
    }

    async fn list_edges(&self, owner: EdgeOwner) -> AppResult<Vec<PermissionEdge>> {
        let edges = self.edges.read().await;
        Ok(sorted(
            edges
                .values()
                .filter(|edge| edge.owner == owner)
                .cloned()
                .collect(),
        ))
    }

    async fn list_role_edges(
        &self,
        role_ids: &[RoleId],
        permission_id: Option<PermissionId>,
    ) -> AppResult<Vec<PermissionEdge>> {
        let edges = self.edges.read().await;
        Ok(sorted(
            edges
                .values()
                .filter(|edge| match edge.owner {
                    EdgeOwner::Role(role_id) => role_ids.contains(&role_id),
                    EdgeOwner::User(_) => false,
                })
                .filter(|edge| permission_id.is_none_or(|wanted| edge.permission_id == wanted))
                .cloned()
                .collect(),
        ))
    }

    async fn apply_batch(&self, owner: EdgeOwner, batch: EdgeBatch) -> AppResult<EdgeBatchResult> {
        let mut edges = self.edges.write().await;
        let mut result = EdgeBatchResult::default();

        for permission_id in batch.removals {
            if edges.remove(&(owner, permission_id)).is_some() {
                result.removed += 1;
            }
        }
        for write in batch.upserts {
            let edge = write.into_edge(owner);
            match edges.insert((owner, edge.permission_id), edge) {
                Some(_) => result.replaced += 1,
                None => result.inserted += 1,
            }
        }

        Ok(result)
    }
}
