//! Grant/deny edges linking roles or users to catalog permissions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use keygate_core::{AppError, PermissionId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// Outcome an edge contributes to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// The owner holds the permission.
    Grant,
    /// The owner is explicitly refused the permission.
    Deny,
}

impl Effect {
    /// Returns a stable storage value for this effect.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Deny => "deny",
        }
    }

    /// Returns whether this effect allows access.
    #[must_use]
    pub fn is_grant(&self) -> bool {
        matches!(self, Self::Grant)
    }
}

impl FromStr for Effect {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "grant" => Ok(Self::Grant),
            "deny" => Ok(Self::Deny),
            _ => Err(AppError::Validation(format!(
                "unknown effect value '{value}'"
            ))),
        }
    }
}

/// Kind of principal an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    /// Edge granted to a role.
    Role,
    /// Direct override on a user.
    User,
}

impl OwnerKind {
    /// Returns a stable storage value for this owner kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::User => "user",
        }
    }
}

/// Principal owning a set of permission edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EdgeOwner {
    /// Role-owned edge set.
    Role(RoleId),
    /// User-owned override set.
    User(UserId),
}

impl EdgeOwner {
    /// Returns the owner kind.
    #[must_use]
    pub fn kind(&self) -> OwnerKind {
        match self {
            Self::Role(_) => OwnerKind::Role,
            Self::User(_) => OwnerKind::User,
        }
    }

    /// Returns the raw identifier value regardless of kind.
    #[must_use]
    pub fn id_value(&self) -> i64 {
        match self {
            Self::Role(role_id) => role_id.value(),
            Self::User(user_id) => user_id.value(),
        }
    }
}

impl std::fmt::Display for EdgeOwner {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.kind().as_str(), self.id_value())
    }
}

/// Audit fields shared by grant and deny edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAudit {
    /// Time of the latest (re-)assignment.
    pub assigned_at: DateTime<Utc>,
    /// Administrator who made the latest assignment.
    pub assigned_by: String,
    /// Exclusive end of validity; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Justification captured at assignment time.
    pub reason: Option<String>,
}

/// One owner-to-permission edge. Unique per `(owner, permission_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEdge {
    /// Role or user the edge belongs to.
    pub owner: EdgeOwner,
    /// Referenced catalog entry. May dangle if the entry is missing.
    pub permission_id: PermissionId,
    /// Grant or deny.
    pub effect: Effect,
    /// Assignment metadata.
    pub audit: EdgeAudit,
}

impl PermissionEdge {
    /// Returns whether the edge participates in resolution at `now`.
    ///
    /// Validity is half-open: an edge is inactive at and after `expires_at`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.audit
            .expires_at
            .is_none_or(|expires_at| now < expires_at)
    }

    /// Returns the exclusive end of validity, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.audit.expires_at
    }
}
