use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use keygate_core::{AppResult, PermissionId, UserId};
use keygate_domain::{
    DecisionSource, EdgeOwner, Permission, PermissionCode, PermissionEdge, Verdict,
    resolve_verdict,
};

use super::{ActiveRoles, PermissionResolver};

/// One granted permission in an effective set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermission {
    /// Catalog id.
    pub permission_id: PermissionId,
    /// Permission code.
    pub code: PermissionCode,
    /// Permission name.
    pub name: String,
    /// Functional module.
    pub module: String,
    /// Action within the module.
    pub action: String,
    /// Level that granted it.
    pub source: DecisionSource,
    /// Instant at which the grant lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

impl EffectivePermission {
    fn granted(permission: &Permission, verdict: Verdict) -> Self {
        Self {
            permission_id: permission.id,
            code: permission.code.clone(),
            name: permission.name.clone(),
            module: permission.module.clone(),
            action: permission.action.clone(),
            source: verdict.source,
            expires_at: verdict.expires_at,
        }
    }
}

/// Every permission a user holds at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermissions {
    /// User the set was computed for.
    pub user_id: UserId,
    /// Evaluation instant.
    pub evaluated_at: DateTime<Utc>,
    /// Granted through direct overrides.
    pub direct: Vec<EffectivePermission>,
    /// Granted through roles.
    pub role: Vec<EffectivePermission>,
    /// Union of `direct` and `role`, ordered by code.
    pub effective: Vec<EffectivePermission>,
    /// Granted codes grouped by module.
    pub by_module: BTreeMap<String, Vec<PermissionCode>>,
}

impl EffectivePermissions {
    /// Returns whether the set contains the code.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.effective
            .iter()
            .any(|permission| permission.code.as_str() == code)
    }
}

impl PermissionResolver {
    /// Computes the user's effective permission set now.
    pub async fn effective_permissions(&self, user_id: UserId) -> AppResult<EffectivePermissions> {
        self.effective_permissions_at(user_id, self.clock.now())
            .await
    }

    /// Computes the user's effective permission set at an instant.
    ///
    /// Every listed entry resolves as granted through [`Self::has_permission_at`]
    /// for the same instant. Dangling and inactive references are skipped.
    pub async fn effective_permissions_at(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<EffectivePermissions> {
        self.effective_permissions_with_roles(user_id, &ActiveRoles::Fetch, at)
            .await
    }

    /// Computes the effective set at an instant from the given role source.
    ///
    /// With [`ActiveRoles::Supplied`] the membership provider is not consulted.
    pub async fn effective_permissions_with_roles(
        &self,
        user_id: UserId,
        active_roles: &ActiveRoles,
        at: DateTime<Utc>,
    ) -> AppResult<EffectivePermissions> {
        let mut effective = self
            .with_read_retry("effective permissions", || {
                self.collect_effective(user_id, active_roles, at)
            })
            .await?;
        effective.sort_by(|left, right| left.code.cmp(&right.code));

        let mut by_module: BTreeMap<String, Vec<PermissionCode>> = BTreeMap::new();
        for permission in &effective {
            by_module
                .entry(permission.module.clone())
                .or_default()
                .push(permission.code.clone());
        }
        let (direct, role): (Vec<_>, Vec<_>) = effective
            .iter()
            .cloned()
            .partition(|permission| permission.source == DecisionSource::User);

        Ok(EffectivePermissions {
            user_id,
            evaluated_at: at,
            direct,
            role,
            effective,
            by_module,
        })
    }

    async fn collect_effective(
        &self,
        user_id: UserId,
        active_roles: &ActiveRoles,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<EffectivePermission>> {
        let role_ids = self.active_role_ids(user_id, active_roles, at).await?;
        let role_edges = if role_ids.is_empty() {
            Vec::new()
        } else {
            self.edges.list_role_edges(&role_ids, None).await?
        };
        let user_edges = self.edges.list_edges(EdgeOwner::User(user_id)).await?;

        let mut candidates: BTreeMap<PermissionId, (Option<&PermissionEdge>, Vec<&PermissionEdge>)> =
            BTreeMap::new();
        for edge in &user_edges {
            candidates.entry(edge.permission_id).or_default().0 = Some(edge);
        }
        for edge in &role_edges {
            candidates.entry(edge.permission_id).or_default().1.push(edge);
        }

        let permission_ids: Vec<PermissionId> = candidates.keys().copied().collect();
        let permissions: HashMap<PermissionId, Permission> = self
            .catalog
            .find_permissions(&permission_ids)
            .await?
            .into_iter()
            .map(|permission| (permission.id, permission))
            .collect();

        let mut effective = Vec::new();
        for (permission_id, (user_edge, role_edges)) in &candidates {
            let Some(permission) = permissions
                .get(permission_id)
                .filter(|permission| permission.is_active)
            else {
                continue;
            };

            let verdict = resolve_verdict(*user_edge, role_edges.iter().copied(), at);
            if verdict.granted {
                effective.push(EffectivePermission::granted(permission, verdict));
            }
        }

        Ok(effective)
    }
}
