mod catalog;
mod edges;
mod membership;

pub use catalog::{
    CodeFilter, CreatePermissionInput, NewPermission, PermissionCatalogRepository,
    PermissionQuery, UpdatePermissionInput,
};
pub use edges::{
    EdgeBatch, EdgeBatchResult, EdgeWrite, PermissionEdgeRepository, UpsertOutcome, UpsertedEdge,
};
pub use membership::RoleMembershipProvider;
