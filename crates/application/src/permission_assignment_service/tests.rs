use std::sync::Arc;

use chrono::Duration;
use keygate_core::{AppError, FixedClock, PermissionId, RoleId, UserId};
use keygate_domain::{EdgeOwner, Effect};

use crate::test_support::{FakeCatalog, FakeEdges, base_time, edge, permission};
use crate::{
    AssignPermissionInput, EdgeListQuery, EdgeSort, OwnerLocks, PagingConfig, UpsertOutcome,
};

use super::PermissionAssignmentService;

fn catalog() -> FakeCatalog {
    let mut archived = permission(3, "EMPLOYEE.ARCHIVE", "EMPLOYEE");
    archived.is_active = false;

    FakeCatalog::with(vec![
        permission(1, "EMPLOYEE.VIEW", "EMPLOYEE"),
        permission(2, "EMPLOYEE.DELETE", "EMPLOYEE"),
        archived,
        permission(4, "PAYROLL.RUN", "PAYROLL"),
    ])
}

fn service(edges: Arc<FakeEdges>) -> PermissionAssignmentService {
    PermissionAssignmentService::new(
        Arc::new(catalog()),
        edges,
        Arc::new(FixedClock::new(base_time())),
        PagingConfig::default(),
        Arc::new(OwnerLocks::new()),
    )
}

fn grant(permission_id: i64) -> AssignPermissionInput {
    AssignPermissionInput {
        permission_id: PermissionId::new(permission_id),
        effect: Effect::Grant,
        expires_at: None,
        assigned_by: "admin".to_owned(),
        reason: None,
    }
}

#[tokio::test]
async fn assign_inserts_then_replaces_in_place() {
    let edges = Arc::new(FakeEdges::default());
    let service = service(Arc::clone(&edges));
    let owner = EdgeOwner::User(UserId::new(42));

    let first = service
        .assign(owner, grant(2))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(first.outcome, UpsertOutcome::Inserted);

    let second = service
        .assign(
            owner,
            AssignPermissionInput {
                effect: Effect::Deny,
                reason: Some("incident 42".to_owned()),
                ..grant(2)
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(second.outcome, UpsertOutcome::Replaced);

    let stored = edges.snapshot(owner).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].effect, Effect::Deny);
    assert_eq!(stored[0].audit.reason.as_deref(), Some("incident 42"));
    assert_eq!(stored[0].audit.assigned_at, base_time());
}

#[tokio::test]
async fn assign_rejects_past_expiry_and_blank_actor() {
    let service = service(Arc::new(FakeEdges::default()));
    let owner = EdgeOwner::Role(RoleId::new(2));

    let past = service
        .assign(
            owner,
            AssignPermissionInput {
                expires_at: Some(base_time()),
                ..grant(1)
            },
        )
        .await;
    assert!(matches!(past, Err(AppError::Validation(_))));

    let blank = service
        .assign(
            owner,
            AssignPermissionInput {
                assigned_by: "  ".to_owned(),
                ..grant(1)
            },
        )
        .await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let long_reason = service
        .assign(
            owner,
            AssignPermissionInput {
                reason: Some("x".repeat(501)),
                ..grant(1)
            },
        )
        .await;
    assert!(matches!(long_reason, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn assign_unknown_permission_is_not_found() {
    let service = service(Arc::new(FakeEdges::default()));

    let result = service
        .assign(EdgeOwner::Role(RoleId::new(2)), grant(77))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn assign_inactive_permission_is_allowed() {
    let edges = Arc::new(FakeEdges::default());
    let service = service(Arc::clone(&edges));
    let owner = EdgeOwner::Role(RoleId::new(2));

    let result = service.assign(owner, grant(3)).await;
    assert!(result.is_ok());
    assert_eq!(edges.snapshot(owner).await.len(), 1);
}

#[tokio::test]
async fn remove_reports_whether_edge_existed() {
    let edges = Arc::new(FakeEdges::default());
    let owner = EdgeOwner::Role(RoleId::new(2));
    edges.seed(vec![edge(owner, 1, Effect::Grant, None)]).await;
    let service = service(Arc::clone(&edges));

    assert!(matches!(
        service.remove(owner, PermissionId::new(1)).await,
        Ok(true)
    ));
    assert!(matches!(
        service.remove(owner, PermissionId::new(1)).await,
        Ok(false)
    ));
}

#[tokio::test]
async fn non_positive_owner_is_rejected() {
    let service = service(Arc::new(FakeEdges::default()));

    let result = service.remove(EdgeOwner::User(UserId::new(0)), PermissionId::new(1)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn list_joins_metadata_filters_and_pages() {
    let edges = Arc::new(FakeEdges::default());
    let owner = EdgeOwner::Role(RoleId::new(5));
    let mut newest = edge(owner, 4, Effect::Grant, None);
    newest.audit.assigned_at = base_time() - Duration::minutes(5);
    edges
        .seed(vec![
            edge(owner, 1, Effect::Grant, None),
            edge(owner, 2, Effect::Deny, Some(base_time() + Duration::days(1))),
            edge(owner, 3, Effect::Grant, Some(base_time() - Duration::days(1))),
            newest,
            edge(owner, 99, Effect::Grant, None),
        ])
        .await;
    let service = service(edges);

    let page = service
        .list(
            owner,
            EdgeListQuery {
                page_size: Some(2),
                ..EdgeListQuery::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].permission_id, PermissionId::new(4));

    let employee = service
        .list(
            owner,
            EdgeListQuery {
                module: Some("EMPLOYEE".to_owned()),
                include_expired: true,
                sort: EdgeSort::Code,
                ..EdgeListQuery::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    let codes: Vec<_> = employee
        .items
        .iter()
        .filter_map(|view| view.permission.as_ref().map(|summary| summary.code.as_str()))
        .collect();
    assert_eq!(
        codes,
        vec!["EMPLOYEE.ARCHIVE", "EMPLOYEE.DELETE", "EMPLOYEE.VIEW"]
    );
    assert!(employee.items[0].is_expired);

    let sorted = service
        .list(
            owner,
            EdgeListQuery {
                sort: EdgeSort::Code,
                ..EdgeListQuery::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    let dangling = sorted.items.last().map(|view| view.permission.is_none());
    assert_eq!(dangling, Some(true));

    let denies = service
        .list(
            owner,
            EdgeListQuery {
                effect: Some(Effect::Deny),
                ..EdgeListQuery::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(denies.total, 1);
}

#[tokio::test]
async fn list_rejects_page_zero() {
    let service = service(Arc::new(FakeEdges::default()));

    let result = service
        .list(
            EdgeOwner::Role(RoleId::new(1)),
            EdgeListQuery {
                page: 0,
                ..EdgeListQuery::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}
