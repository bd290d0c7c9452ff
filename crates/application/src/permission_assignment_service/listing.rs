use std::cmp::Ordering;
use std::collections::HashMap;

use keygate_core::{AppError, AppResult};
use keygate_domain::{EdgeOwner, Permission, PermissionEdge};

use super::{
    EdgeListQuery, EdgePage, EdgeSort, EdgeView, PermissionAssignmentService, PermissionSummary,
    validate_owner,
};

impl PermissionAssignmentService {
    /// Lists one owner's edges joined with catalog metadata.
    ///
    /// Edges whose permission no longer exists are reported with
    /// `permission: None` unless a module or code filter excludes them.
    pub async fn list(&self, owner: EdgeOwner, query: EdgeListQuery) -> AppResult<EdgePage> {
        validate_owner(owner)?;
        if query.page == 0 {
            return Err(AppError::Validation("page numbers start at 1".to_owned()));
        }
        let page_size = self.paging.page_size(query.page_size)?;
        let now = self.clock.now();

        let edges = self.edges.list_edges(owner).await?;
        let permission_ids: Vec<_> = edges.iter().map(|edge| edge.permission_id).collect();
        let permissions: HashMap<_, _> = self
            .catalog
            .find_permissions(&permission_ids)
            .await?
            .into_iter()
            .map(|permission| (permission.id, permission))
            .collect();

        let mut views: Vec<EdgeView> = edges
            .into_iter()
            .map(|edge| {
                let permission = permissions.get(&edge.permission_id);
                if permission.is_none() {
                    tracing::debug!(
                        owner = %owner,
                        permission_id = %edge.permission_id,
                        "edge references a missing permission"
                    );
                }
                edge_view(edge, permission, now)
            })
            .filter(|view| matches_query(view, &query))
            .collect();

        match query.sort {
            EdgeSort::NewestFirst => views.sort_by(|left, right| {
                right
                    .assigned_at
                    .cmp(&left.assigned_at)
                    .then(left.permission_id.cmp(&right.permission_id))
            }),
            EdgeSort::Code => views.sort_by(compare_by_code),
        }

        let total = views.len();
        let items = views
            .into_iter()
            .skip((query.page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(EdgePage {
            items,
            total,
            page: query.page,
            page_size,
        })
    }
}

fn edge_view(
    edge: PermissionEdge,
    permission: Option<&Permission>,
    now: chrono::DateTime<chrono::Utc>,
) -> EdgeView {
    let is_expired = !edge.is_active_at(now);
    EdgeView {
        owner: edge.owner,
        permission_id: edge.permission_id,
        effect: edge.effect,
        assigned_at: edge.audit.assigned_at,
        assigned_by: edge.audit.assigned_by,
        expires_at: edge.audit.expires_at,
        reason: edge.audit.reason,
        is_expired,
        permission: permission.map(|permission| PermissionSummary {
            code: permission.code.clone(),
            name: permission.name.clone(),
            module: permission.module.clone(),
            action: permission.action.clone(),
            is_active: permission.is_active,
        }),
    }
}

fn matches_query(view: &EdgeView, query: &EdgeListQuery) -> bool {
    if !query.include_expired && view.is_expired {
        return false;
    }
    if query.effect.is_some_and(|effect| effect != view.effect) {
        return false;
    }
    if let Some(module) = query.module.as_deref()
        && view
            .permission
            .as_ref()
            .is_none_or(|permission| permission.module != module)
    {
        return false;
    }
    if let Some(prefix) = query.code_prefix.as_deref()
        && view
            .permission
            .as_ref()
            .is_none_or(|permission| !permission.code.has_prefix(prefix))
    {
        return false;
    }

    true
}

fn compare_by_code(left: &EdgeView, right: &EdgeView) -> Ordering {
    match (&left.permission, &right.permission) {
        (Some(left), Some(right)) => left.code.cmp(&right.code),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.permission_id.cmp(&right.permission_id),
    }
}
