//! Application services and ports.

#![forbid(unsafe_code)]

mod bulk_permission_service;
mod engine_config;
mod owner_locks;
mod permission_assignment_service;
mod permission_catalog_service;
mod permission_ports;
mod permission_resolver;

#[cfg(test)]
mod test_support;

pub use bulk_permission_service::{BulkAssignInput, BulkOutcome, BulkPermissionService};
pub use engine_config::{PagingConfig, ResolutionConfig};
pub use owner_locks::OwnerLocks;
pub use permission_assignment_service::{
    AssignPermissionInput, AssignmentResult, EdgeListQuery, EdgePage, EdgeSort, EdgeView,
    PermissionAssignmentService, PermissionSummary,
};
pub use permission_catalog_service::PermissionCatalogService;
pub use permission_ports::{
    CodeFilter, CreatePermissionInput, EdgeBatch, EdgeBatchResult, EdgeWrite, NewPermission,
    PermissionCatalogRepository, PermissionEdgeRepository, PermissionQuery,
    RoleMembershipProvider, UpdatePermissionInput, UpsertOutcome, UpsertedEdge,
};
pub use permission_resolver::{
    ActiveRoles, EffectivePermission, EffectivePermissions, PermissionCheck, PermissionDecision,
    PermissionResolver,
};
