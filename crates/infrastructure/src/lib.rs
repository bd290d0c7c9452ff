//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_permission_catalog;
mod in_memory_permission_edge_repository;
mod in_memory_role_membership_repository;
mod postgres_permission_catalog_repository;
mod postgres_permission_edge_repository;
mod postgres_role_membership_repository;
mod storage_error;

#[cfg(test)]
mod postgres_test_support;

pub use in_memory_permission_catalog::InMemoryPermissionCatalog;
pub use in_memory_permission_edge_repository::InMemoryPermissionEdgeRepository;
pub use in_memory_role_membership_repository::InMemoryRoleMembershipRepository;
pub use postgres_permission_catalog_repository::PostgresPermissionCatalogRepository;
pub use postgres_permission_edge_repository::PostgresPermissionEdgeRepository;
pub use postgres_role_membership_repository::PostgresRoleMembershipRepository;

/// Embedded schema migrations for the permission tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
