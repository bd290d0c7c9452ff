//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod edge;
mod membership;
mod permission;
mod resolution;

#[cfg(test)]
mod resolution_proptest;

pub use edge::{EdgeAudit, EdgeOwner, Effect, OwnerKind, PermissionEdge};
pub use membership::RoleMembership;
pub use permission::{PERMISSION_CODE_MAX_LENGTH, Permission, PermissionCode};
pub use resolution::{
    DecisionSource, RoleLevel, Verdict, VerdictReason, resolve_role_level, resolve_verdict,
};
