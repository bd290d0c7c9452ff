use std::sync::Arc;

use keygate_core::{AppError, FixedClock, PermissionId};

use crate::test_support::{FakeCatalog, base_time, permission};
use crate::{
    CodeFilter, CreatePermissionInput, PagingConfig, PermissionQuery, UpdatePermissionInput,
};

use super::PermissionCatalogService;

fn service(catalog: FakeCatalog) -> PermissionCatalogService {
    PermissionCatalogService::new(
        Arc::new(catalog),
        Arc::new(FixedClock::new(base_time())),
        PagingConfig::default(),
    )
}

fn create_input(code: &str) -> CreatePermissionInput {
    CreatePermissionInput {
        code: code.to_owned(),
        name: "  Delete employee ".to_owned(),
        description: Some(String::new()),
        module: "EMPLOYEE".to_owned(),
        action: "DELETE".to_owned(),
        resource_template: Some("employee:{id}".to_owned()),
    }
}

#[tokio::test]
async fn create_registers_active_permission_with_trimmed_fields() {
    let service = service(FakeCatalog::default());

    let created = service
        .create(create_input("EMPLOYEE.DELETE"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(created.id, PermissionId::new(1));
    assert_eq!(created.name, "Delete employee");
    assert_eq!(created.description, None);
    assert!(created.is_active);
    assert_eq!(created.created_at, base_time());
}

#[tokio::test]
async fn create_rejects_duplicate_code() {
    let service = service(FakeCatalog::with(vec![permission(
        1,
        "EMPLOYEE.DELETE",
        "EMPLOYEE",
    )]));

    let result = service.create(create_input("EMPLOYEE.DELETE")).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn create_rejects_malformed_code_and_blank_name() {
    let service = service(FakeCatalog::default());

    let bad_code = service.create(create_input("EMPLOYEE..DELETE")).await;
    assert!(matches!(bad_code, Err(AppError::Validation(_))));

    let blank_name = service
        .create(CreatePermissionInput {
            name: "   ".to_owned(),
            ..create_input("EMPLOYEE.VIEW")
        })
        .await;
    assert!(matches!(blank_name, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn update_changes_fields_and_clears_optional_values() {
    let mut seeded = permission(4, "PAYROLL.RUN", "PAYROLL");
    seeded.description = Some("monthly run".to_owned());
    let service = service(FakeCatalog::with(vec![seeded]));

    let updated = service
        .update(
            PermissionId::new(4),
            UpdatePermissionInput {
                name: Some("Run payroll".to_owned()),
                description: Some(String::new()),
                ..UpdatePermissionInput::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(updated.code.as_str(), "PAYROLL.RUN");
    assert_eq!(updated.name, "Run payroll");
    assert_eq!(updated.description, None);
    assert_eq!(updated.updated_at, base_time());
}

#[tokio::test]
async fn deactivate_and_activate_toggle_flag() {
    let service = service(FakeCatalog::with(vec![permission(
        2,
        "EMPLOYEE.VIEW",
        "EMPLOYEE",
    )]));

    let deactivated = service
        .deactivate(PermissionId::new(2))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!deactivated.is_active);

    let hidden = service
        .query(PermissionQuery::default())
        .await
        .unwrap_or_default();
    assert!(hidden.is_empty());

    let activated = service
        .activate(PermissionId::new(2))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(activated.is_active);
}

#[tokio::test]
async fn get_missing_permission_is_not_found() {
    let service = service(FakeCatalog::default());

    let result = service.get(PermissionId::new(99)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn query_filters_by_prefix_and_caps_limit() {
    let catalog = FakeCatalog::with(vec![
        permission(1, "EMPLOYEE.VIEW", "EMPLOYEE"),
        permission(2, "EMPLOYEE.DELETE", "EMPLOYEE"),
        permission(3, "EMPLOYEE.EDIT", "EMPLOYEE"),
        permission(4, "PAYROLL.RUN", "PAYROLL"),
    ]);
    let service = PermissionCatalogService::new(
        Arc::new(catalog),
        Arc::new(FixedClock::new(base_time())),
        PagingConfig::new(1, 2).unwrap_or_default(),
    );

    let listed = service
        .query(PermissionQuery {
            code: Some(CodeFilter::Prefix("EMPLOYEE".to_owned())),
            limit: 1_000,
            ..PermissionQuery::default()
        })
        .await
        .unwrap_or_default();

    let codes: Vec<&str> = listed.iter().map(|entry| entry.code.as_str()).collect();
    assert_eq!(codes, vec!["EMPLOYEE.DELETE", "EMPLOYEE.EDIT"]);
}
