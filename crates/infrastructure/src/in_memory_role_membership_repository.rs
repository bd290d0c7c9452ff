use std::collections::HashMap;

use async_trait::async_trait;
use keygate_application::RoleMembershipProvider;
use keygate_core::{AppResult, RoleId, UserId};
use keygate_domain::RoleMembership;
use tokio::sync::RwLock;

/// In-memory stand-in for the identity layer's role memberships.
#[derive(Debug, Default)]
pub struct InMemoryRoleMembershipRepository {
    memberships: RwLock<HashMap<UserId, Vec<RoleMembership>>>,
}

impl InMemoryRoleMembershipRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a membership for the user and role.
    pub async fn assign_role(&self, membership: RoleMembership) {
        let mut memberships = self.memberships.write().await;
        let entries = memberships.entry(membership.user_id).or_default();
        entries.retain(|existing| existing.role_id != membership.role_id);
        entries.push(membership);
    }

    /// Removes a membership. Returns whether it existed.
    pub async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> bool {
        let mut memberships = self.memberships.write().await;
        let Some(entries) = memberships.get_mut(&user_id) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|existing| existing.role_id != role_id);
        before != entries.len()
    }

    /// Flags a role active or inactive across all memberships.
    pub async fn set_role_active(&self, role_id: RoleId, is_active: bool) {
        for membership in self
            .memberships
            .write()
            .await
            .values_mut()
            .flatten()
            .filter(|membership| membership.role_id == role_id)
        {
            membership.role_is_active = is_active;
        }
    }
}

#[async_trait]
impl RoleMembershipProvider for InMemoryRoleMembershipRepository {
    async fn list_role_memberships(&self, user_id: UserId) -> AppResult<Vec<RoleMembership>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
