use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use keygate_application::{
    EdgeBatch, EdgeBatchResult, EdgeWrite, PermissionEdgeRepository, UpsertOutcome, UpsertedEdge,
};
use keygate_core::{AppError, AppResult, PermissionId, RoleId, UserId};
use keygate_domain::{EdgeAudit, EdgeOwner, Effect, OwnerKind, PermissionEdge};

use crate::storage_error::storage_error;

/// PostgreSQL-backed store for `role_permissions` and `user_permissions`.
///
/// Batches run in one transaction guarded by a per-owner advisory lock.
#[derive(Clone)]
pub struct PostgresPermissionEdgeRepository {
    pool: PgPool,
}

impl PostgresPermissionEdgeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    owner_id: i64,
    permission_id: i64,
    effect: String,
    assigned_at: DateTime<Utc>,
    assigned_by: String,
    expires_at: Option<DateTime<Utc>>,
    reason: Option<String>,
}

impl EdgeRow {
    fn into_edge(self, kind: OwnerKind) -> AppResult<PermissionEdge> {
        let owner = match kind {
            OwnerKind::Role => EdgeOwner::Role(RoleId::new(self.owner_id)),
            OwnerKind::User => EdgeOwner::User(UserId::new(self.owner_id)),
        };
        let effect = Effect::from_str(self.effect.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode effect for {owner} and permission {}: {error}",
                self.permission_id
            ))
        })?;

        Ok(PermissionEdge {
            owner,
            permission_id: PermissionId::new(self.permission_id),
            effect,
            audit: EdgeAudit {
                assigned_at: self.assigned_at,
                assigned_by: self.assigned_by,
                expires_at: self.expires_at,
                reason: self.reason,
            },
        })
    }
}

/// Table and owner column holding edges for one owner kind.
fn edge_table(kind: OwnerKind) -> (&'static str, &'static str) {
    match kind {
        OwnerKind::Role => ("role_permissions", "role_id"),
        OwnerKind::User => ("user_permissions", "user_id"),
    }
}

fn select_edges_sql(kind: OwnerKind, predicate: &str) -> String {
    let (table, owner_column) = edge_table(kind);
    format!(
        r#"
        SELECT {owner_column} AS owner_id, permission_id, effect, assigned_at,
            assigned_by, expires_at, reason
        FROM {table}
        WHERE {predicate}
        ORDER BY {owner_column}, permission_id
        "#
    )
}

fn upsert_edge_sql(kind: OwnerKind) -> String {
    let (table, owner_column) = edge_table(kind);
    format!(
        r#"
        INSERT INTO {table} (
            {owner_column}, permission_id, effect, assigned_at, assigned_by, expires_at, reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT ({owner_column}, permission_id) DO UPDATE
        SET effect = EXCLUDED.effect,
            assigned_at = EXCLUDED.assigned_at,
            assigned_by = EXCLUDED.assigned_by,
            expires_at = EXCLUDED.expires_at,
            reason = EXCLUDED.reason
        RETURNING (xmax = 0) AS inserted
        "#
    )
}

fn decode_rows(rows: Vec<EdgeRow>, kind: OwnerKind) -> AppResult<Vec<PermissionEdge>> {
    rows.into_iter().map(|row| row.into_edge(kind)).collect()
}

async fn upsert_in_transaction(
    transaction: &mut Transaction<'_, Postgres>,
    owner: EdgeOwner,
    write: &EdgeWrite,
) -> AppResult<UpsertOutcome> {
    let inserted = sqlx::query_scalar::<_, bool>(&upsert_edge_sql(owner.kind()))
        .bind(owner.id_value())
        .bind(write.permission_id.value())
        .bind(write.effect.as_str())
        .bind(write.assigned_at)
        .bind(write.assigned_by.as_str())
        .bind(write.expires_at)
        .bind(write.reason.as_deref())
        .fetch_one(&mut **transaction)
        .await
        .map_err(|error| storage_error("upsert permission edge", error))?;

    Ok(if inserted {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Replaced
    })
}

#[async_trait]
impl PermissionEdgeRepository for PostgresPermissionEdgeRepository {
    async fn upsert_edge(&self, owner: EdgeOwner, edge: EdgeWrite) -> AppResult<UpsertedEdge> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_error("begin transaction", error))?;
        let outcome = upsert_in_transaction(&mut transaction, owner, &edge).await?;
        transaction
            .commit()
            .await
            .map_err(|error| storage_error("commit transaction", error))?;

        Ok(UpsertedEdge {
            edge: edge.into_edge(owner),
            outcome,
        })
    }

    async fn delete_edge(&self, owner: EdgeOwner, permission_id: PermissionId) -> AppResult<bool> {
        let (table, owner_column) = edge_table(owner.kind());
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE {owner_column} = $1 AND permission_id = $2"
        ))
        .bind(owner.id_value())
        .bind(permission_id.value())
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error("delete permission edge", error))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_edge(
        &self,
        owner: EdgeOwner,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionEdge>> {
        let (_, owner_column) = edge_table(owner.kind());
        let row = sqlx::query_as::<_, EdgeRow>(&select_edges_sql(
            owner.kind(),
            &format!("{owner_column} = $1 AND permission_id = $2"),
        ))
        .bind(owner.id_value())
        .bind(permission_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| storage_error("load permission edge", error))?;

        row.map(|row| row.into_edge(owner.kind())).transpose()
    }

    async fn list_edges(&self, owner: EdgeOwner) -> AppResult<Vec<PermissionEdge>> {
        let (_, owner_column) = edge_table(owner.kind());
        let rows = sqlx::query_as::<_, EdgeRow>(&select_edges_sql(
            owner.kind(),
            &format!("{owner_column} = $1"),
        ))
        .bind(owner.id_value())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("list permission edges", error))?;

        decode_rows(rows, owner.kind())
    }

    async fn list_role_edges(
        &self,
        role_ids: &[RoleId],
        permission_id: Option<PermissionId>,
    ) -> AppResult<Vec<PermissionEdge>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let role_ids: Vec<i64> = role_ids.iter().map(RoleId::value).collect();
        let rows = sqlx::query_as::<_, EdgeRow>(&select_edges_sql(
            OwnerKind::Role,
            "role_id = ANY($1) AND ($2::BIGINT IS NULL OR permission_id = $2)",
        ))
        .bind(role_ids)
        .bind(permission_id.map(|permission_id| permission_id.value()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("list role permission edges", error))?;

        decode_rows(rows, OwnerKind::Role)
    }

    async fn apply_batch(&self, owner: EdgeOwner, batch: EdgeBatch) -> AppResult<EdgeBatchResult> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_error("begin transaction", error))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(owner.to_string())
            .execute(&mut *transaction)
            .await
            .map_err(|error| storage_error("lock permission owner", error))?;

        let mut result = EdgeBatchResult::default();
        if !batch.removals.is_empty() {
            let (table, owner_column) = edge_table(owner.kind());
            let removals: Vec<i64> = batch.removals.iter().map(PermissionId::value).collect();
            let deleted = sqlx::query(&format!(
                "DELETE FROM {table} WHERE {owner_column} = $1 AND permission_id = ANY($2)"
            ))
            .bind(owner.id_value())
            .bind(removals)
            .execute(&mut *transaction)
            .await
            .map_err(|error| storage_error("delete permission edges", error))?;
            result.removed = usize::try_from(deleted.rows_affected()).unwrap_or(usize::MAX);
        }

        for write in &batch.upserts {
            match upsert_in_transaction(&mut transaction, owner, write).await? {
                UpsertOutcome::Inserted => result.inserted += 1,
                UpsertOutcome::Replaced => result.replaced += 1,
            }
        }

        transaction
            .commit()
            .await
            .map_err(|error| storage_error("commit transaction", error))?;

        tracing::debug!(
            owner = %owner,
            inserted = result.inserted,
            replaced = result.replaced,
            removed = result.removed,
            "permission edge batch committed"
        );
        Ok(result)
    }
}
