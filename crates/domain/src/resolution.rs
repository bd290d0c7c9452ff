//! Precedence rules for combining role edges and direct overrides.
//!
//! Resolution happens in two levels:
//! - role level: among active role edges an explicit deny suppresses grants;
//! - user level: an active direct override replaces the role-level result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::edge::{Effect, PermissionEdge};

/// Level that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionSource {
    /// A direct user override decided.
    User,
    /// Role-derived edges decided.
    Role,
    /// Nothing applicable was found.
    None,
}

impl DecisionSource {
    /// Returns a stable transport value for this source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Role => "Role",
            Self::None => "None",
        }
    }
}

/// Explanation attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    /// The code is not in the catalog or the entry is deactivated.
    UnknownOrInactivePermission,
    /// An active direct override grants the permission.
    DirectGrant,
    /// An active direct override denies the permission.
    DirectDeny,
    /// At least one active role grants and none denies.
    RoleGrant,
    /// At least one active role denies.
    RoleDeny,
    /// No active edge references the permission.
    NoGrant,
}

impl VerdictReason {
    /// Returns a human-readable description.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownOrInactivePermission => "unknown or inactive permission",
            Self::DirectGrant => "granted by direct override",
            Self::DirectDeny => "denied by direct override",
            Self::RoleGrant => "granted by role",
            Self::RoleDeny => "denied by role",
            Self::NoGrant => "no grant found",
        }
    }
}

/// Aggregated result of the role level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLevel {
    /// Some active role grants and none denies.
    Granted {
        /// Latest expiry among the granting edges; `None` if any never expires.
        expires_at: Option<DateTime<Utc>>,
    },
    /// Some active role denies.
    Denied {
        /// Latest expiry among the denying edges; `None` if any never expires.
        expires_at: Option<DateTime<Utc>>,
    },
    /// No active role edge references the permission.
    NoGrant,
}

/// Final precedence-resolved outcome for one permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether access is allowed.
    pub granted: bool,
    /// Level that decided.
    pub source: DecisionSource,
    /// Explanation.
    pub reason: VerdictReason,
    /// Instant at which the deciding edge(s) lapse.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Verdict {
    /// Denied verdict for a code that cannot be resolved against the catalog.
    #[must_use]
    pub fn unknown_permission() -> Self {
        Self {
            granted: false,
            source: DecisionSource::None,
            reason: VerdictReason::UnknownOrInactivePermission,
            expires_at: None,
        }
    }
}

/// Folds role edges for one permission into the role-level result.
///
/// Expired edges are ignored. Deny wins over grant at this level.
pub fn resolve_role_level<'a, I>(edges: I, now: DateTime<Utc>) -> RoleLevel
where
    I: IntoIterator<Item = &'a PermissionEdge>,
{
    let mut grant_expiry = None;
    let mut deny_expiry = None;

    for edge in edges.into_iter().filter(|edge| edge.is_active_at(now)) {
        match edge.effect {
            Effect::Grant => grant_expiry = Some(latest_expiry(grant_expiry, edge.expires_at())),
            Effect::Deny => deny_expiry = Some(latest_expiry(deny_expiry, edge.expires_at())),
        }
    }

    match (deny_expiry, grant_expiry) {
        (Some(expires_at), _) => RoleLevel::Denied { expires_at },
        (None, Some(expires_at)) => RoleLevel::Granted { expires_at },
        (None, None) => RoleLevel::NoGrant,
    }
}

/// Combines an optional direct override with role edges for one permission.
pub fn resolve_verdict<'a, I>(
    user_edge: Option<&PermissionEdge>,
    role_edges: I,
    now: DateTime<Utc>,
) -> Verdict
where
    I: IntoIterator<Item = &'a PermissionEdge>,
{
    if let Some(edge) = user_edge.filter(|edge| edge.is_active_at(now)) {
        let reason = match edge.effect {
            Effect::Grant => VerdictReason::DirectGrant,
            Effect::Deny => VerdictReason::DirectDeny,
        };

        return Verdict {
            granted: edge.effect.is_grant(),
            source: DecisionSource::User,
            reason,
            expires_at: edge.expires_at(),
        };
    }

    match resolve_role_level(role_edges, now) {
        RoleLevel::Granted { expires_at } => Verdict {
            granted: true,
            source: DecisionSource::Role,
            reason: VerdictReason::RoleGrant,
            expires_at,
        },
        RoleLevel::Denied { expires_at } => Verdict {
            granted: false,
            source: DecisionSource::Role,
            reason: VerdictReason::RoleDeny,
            expires_at,
        },
        RoleLevel::NoGrant => Verdict {
            granted: false,
            source: DecisionSource::None,
            reason: VerdictReason::NoGrant,
            expires_at: None,
        },
    }
}

// `None` means "never expires" and absorbs any finite expiry.
fn latest_expiry(
    current: Option<Option<DateTime<Utc>>>,
    next: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, next) {
        (None, next) => next,
        (Some(None), _) | (_, None) => None,
        (Some(Some(current)), Some(next)) => Some(current.max(next)),
    }
}
