use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use keygate_application::RoleMembershipProvider;
use keygate_core::{AppResult, RoleId, UserId};
use keygate_domain::RoleMembership;

use crate::storage_error::storage_error;

/// PostgreSQL-backed reader for `user_roles` joined with `roles`.
#[derive(Clone)]
pub struct PostgresRoleMembershipRepository {
    pool: PgPool,
}

impl PostgresRoleMembershipRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    user_id: i64,
    role_id: i64,
    role_name: String,
    role_is_active: bool,
    expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl RoleMembershipProvider for PostgresRoleMembershipRepository {
    async fn list_role_memberships(&self, user_id: UserId) -> AppResult<Vec<RoleMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT
                user_roles.user_id,
                user_roles.role_id,
                roles.name AS role_name,
                roles.is_active AS role_is_active,
                user_roles.expires_at
            FROM user_roles
            INNER JOIN roles ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
            ORDER BY roles.name
            "#,
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("load role memberships", error))?;

        Ok(rows
            .into_iter()
            .map(|row| RoleMembership {
                user_id: UserId::new(row.user_id),
                role_id: RoleId::new(row.role_id),
                role_name: row.role_name,
                role_is_active: row.role_is_active,
                expires_at: row.expires_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use keygate_application::RoleMembershipProvider;
    use keygate_core::UserId;
    use sqlx::PgPool;

    use crate::postgres_test_support::{test_pool, unique_id};

    use super::PostgresRoleMembershipRepository;

    async fn insert_role(pool: &PgPool, name: &str, is_active: bool) -> i64 {
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO roles (name, is_active) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(is_active)
        .fetch_one(pool)
        .await;

        inserted.unwrap_or_else(|error| panic!("failed to insert role: {error}"))
    }

    #[tokio::test]
    async fn memberships_carry_role_activity_and_expiry() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let suffix = unique_id();
        let manager = insert_role(&pool, &format!("manager-{suffix}"), true).await;
        let retired = insert_role(&pool, &format!("retired-{suffix}"), false).await;
        let user_id = unique_id();

        for (role_id, expires_at) in [(manager, None), (retired, Some(Utc::now() + Duration::days(1)))] {
            let inserted = sqlx::query(
                "INSERT INTO user_roles (user_id, role_id, expires_at) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(role_id)
            .bind(expires_at)
            .execute(&pool)
            .await;
            assert!(inserted.is_ok());
        }

        let repository = PostgresRoleMembershipRepository::new(pool);
        let memberships = repository
            .list_role_memberships(UserId::new(user_id))
            .await
            .unwrap_or_default();

        assert_eq!(memberships.len(), 2);
        assert!(memberships[0].role_is_active);
        assert!(!memberships[1].role_is_active);
        assert!(memberships[1].expires_at.is_some());

        let nobody = repository
            .list_role_memberships(UserId::new(-unique_id()))
            .await
            .unwrap_or_default();
        assert!(nobody.is_empty());
    }
}
