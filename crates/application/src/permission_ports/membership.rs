use async_trait::async_trait;

use keygate_core::{AppResult, UserId};
use keygate_domain::RoleMembership;

/// Read-only port onto the external role membership collaborator.
#[async_trait]
pub trait RoleMembershipProvider: Send + Sync {
    /// Lists memberships of a user, inactive and expired ones included.
    ///
    /// Unknown users yield an empty list rather than an error.
    async fn list_role_memberships(&self, user_id: UserId) -> AppResult<Vec<RoleMembership>>;
}
