use chrono::{DateTime, Utc};
use keygate_core::{RoleId, UserId};
use serde::{Deserialize, Serialize};

/// Read model of one user-to-role membership owned by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMembership {
    /// Member user.
    pub user_id: UserId,
    /// Granted role.
    pub role_id: RoleId,
    /// Role display name.
    pub role_name: String,
    /// Inactive roles contribute nothing to resolution.
    pub role_is_active: bool,
    /// Exclusive end of the membership; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleMembership {
    /// Returns whether the membership counts towards resolution at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.role_is_active && self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}
