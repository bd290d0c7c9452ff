use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use keygate_core::{AppError, AppResult, Clock, RoleId, UserId};
use keygate_domain::{
    DecisionSource, EdgeOwner, PermissionCode, Verdict, VerdictReason, resolve_verdict,
};

use crate::{
    PermissionCatalogRepository, PermissionEdgeRepository, ResolutionConfig,
    RoleMembershipProvider,
};

mod effective;
mod retry;

pub use effective::{EffectivePermission, EffectivePermissions};

/// Where the resolver takes the user's active roles from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveRoles {
    /// Ask the membership provider.
    #[default]
    Fetch,
    /// Trust a role set the caller already holds, e.g. from a session.
    Supplied(Vec<RoleId>),
}

/// One permission question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheck {
    /// User being checked.
    pub user_id: UserId,
    /// Permission code.
    pub code: String,
    /// Resource instance echoed into the decision.
    pub resource: Option<String>,
    /// Source of the user's active roles.
    pub active_roles: ActiveRoles,
    /// Evaluation instant; the clock is read when absent.
    pub at: Option<DateTime<Utc>>,
}

impl PermissionCheck {
    /// Creates a check for the current instant with fetched roles.
    #[must_use]
    pub fn new(user_id: UserId, code: impl Into<String>) -> Self {
        Self {
            user_id,
            code: code.into(),
            resource: None,
            active_roles: ActiveRoles::Fetch,
            at: None,
        }
    }

    /// Sets the resource instance.
    #[must_use]
    pub fn with_resource(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_owned);
        self
    }

    /// Uses a caller-supplied active role set.
    #[must_use]
    pub fn with_active_roles(mut self, role_ids: Vec<RoleId>) -> Self {
        self.active_roles = ActiveRoles::Supplied(role_ids);
        self
    }

    /// Evaluates at a fixed instant.
    #[must_use]
    pub fn at(mut self, instant: DateTime<Utc>) -> Self {
        self.at = Some(instant);
        self
    }
}

/// Resolved answer to a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    /// User that was checked.
    pub user_id: UserId,
    /// Permission code as asked.
    pub code: String,
    /// Whether access is allowed.
    pub granted: bool,
    /// Level that decided.
    pub source: DecisionSource,
    /// Explanation.
    pub reason: VerdictReason,
    /// Instant at which the deciding edge(s) lapse.
    pub expires_at: Option<DateTime<Utc>>,
    /// Resource template of the catalog entry.
    pub resource_template: Option<String>,
    /// Resource instance passed by the caller.
    pub resource: Option<String>,
    /// Evaluation instant.
    pub evaluated_at: DateTime<Utc>,
}

impl PermissionDecision {
    /// Returns the human-readable explanation.
    #[must_use]
    pub fn reason_text(&self) -> &'static str {
        self.reason.as_str()
    }
}

/// Read-side service answering permission checks.
///
/// Reads never take write locks. A check observes each edge either before or
/// after any concurrent write to it.
#[derive(Clone)]
pub struct PermissionResolver {
    catalog: Arc<dyn PermissionCatalogRepository>,
    edges: Arc<dyn PermissionEdgeRepository>,
    memberships: Arc<dyn RoleMembershipProvider>,
    clock: Arc<dyn Clock>,
    config: ResolutionConfig,
}

impl PermissionResolver {
    /// Creates a new resolver.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PermissionCatalogRepository>,
        edges: Arc<dyn PermissionEdgeRepository>,
        memberships: Arc<dyn RoleMembershipProvider>,
        clock: Arc<dyn Clock>,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            catalog,
            edges,
            memberships,
            clock,
            config,
        }
    }

    /// Decides whether a user holds a permission now.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        code: &str,
        resource: Option<&str>,
    ) -> AppResult<PermissionDecision> {
        self.check(PermissionCheck::new(user_id, code).with_resource(resource))
            .await
    }

    /// Decides whether a user holds a permission at a given instant.
    pub async fn has_permission_at(
        &self,
        user_id: UserId,
        code: &str,
        resource: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<PermissionDecision> {
        self.check(
            PermissionCheck::new(user_id, code)
                .with_resource(resource)
                .at(at),
        )
        .await
    }

    /// Resolves a fully specified check.
    ///
    /// Malformed codes are rejected before any storage access. Unknown and
    /// inactive codes resolve to a denied decision.
    pub async fn check(&self, check: PermissionCheck) -> AppResult<PermissionDecision> {
        let code = PermissionCode::new(check.code.as_str())?;
        let now = check.at.unwrap_or_else(|| self.clock.now());

        let (verdict, resource_template) = self
            .with_read_retry("permission check", || {
                self.evaluate(check.user_id, &code, &check.active_roles, now)
            })
            .await?;

        tracing::debug!(
            user_id = %check.user_id,
            code = %code,
            granted = verdict.granted,
            source = verdict.source.as_str(),
            "permission resolved"
        );
        Ok(PermissionDecision {
            user_id: check.user_id,
            code: code.as_str().to_owned(),
            granted: verdict.granted,
            source: verdict.source,
            reason: verdict.reason,
            expires_at: verdict.expires_at,
            resource_template,
            resource: check.resource,
            evaluated_at: now,
        })
    }

    /// Ensures the user holds the permission.
    pub async fn require_permission(&self, user_id: UserId, code: &str) -> AppResult<()> {
        let decision = self.has_permission(user_id, code, None).await?;
        if decision.granted {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user {user_id} is missing permission '{}': {}",
            decision.code,
            decision.reason_text()
        )))
    }

    /// Boolean check for request guards. Any error denies.
    pub async fn is_permitted(&self, user_id: UserId, code: &str, resource: Option<&str>) -> bool {
        match self.has_permission(user_id, code, resource).await {
            Ok(decision) => decision.granted,
            Err(error) => {
                tracing::warn!(
                    user_id = %user_id,
                    code,
                    error = %error,
                    "permission check failed; denying"
                );
                false
            }
        }
    }

    async fn evaluate(
        &self,
        user_id: UserId,
        code: &PermissionCode,
        active_roles: &ActiveRoles,
        now: DateTime<Utc>,
    ) -> AppResult<(Verdict, Option<String>)> {
        let Some(permission) = self
            .catalog
            .find_permission_by_code(code.as_str())
            .await?
            .filter(|permission| permission.is_active)
        else {
            return Ok((Verdict::unknown_permission(), None));
        };
        let resource_template = permission.effective_resource_template().map(str::to_owned);

        let user_edge = self
            .edges
            .find_edge(EdgeOwner::User(user_id), permission.id)
            .await?;
        if let Some(edge) = user_edge.as_ref().filter(|edge| edge.is_active_at(now)) {
            return Ok((
                resolve_verdict(Some(edge), std::iter::empty(), now),
                resource_template,
            ));
        }

        let role_ids = self.active_role_ids(user_id, active_roles, now).await?;
        let role_edges = if role_ids.is_empty() {
            Vec::new()
        } else {
            self.edges
                .list_role_edges(&role_ids, Some(permission.id))
                .await?
        };

        Ok((
            resolve_verdict(user_edge.as_ref(), role_edges.iter(), now),
            resource_template,
        ))
    }

    async fn active_role_ids(
        &self,
        user_id: UserId,
        active_roles: &ActiveRoles,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleId>> {
        let mut role_ids: Vec<RoleId> = match active_roles {
            ActiveRoles::Supplied(role_ids) => role_ids.clone(),
            ActiveRoles::Fetch => self
                .memberships
                .list_role_memberships(user_id)
                .await?
                .into_iter()
                .filter(|membership| membership.is_active_at(now))
                .map(|membership| membership.role_id)
                .collect(),
        };
        role_ids.sort_unstable();
        role_ids.dedup();
        Ok(role_ids)
    }
}
