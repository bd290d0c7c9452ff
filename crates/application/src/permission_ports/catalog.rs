use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keygate_core::{AppResult, PermissionId};
use keygate_domain::{Permission, PermissionCode};

/// Input payload for registering a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePermissionInput {
    /// Globally unique code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Functional module.
    pub module: String,
    /// Action within the module.
    pub action: String,
    /// Optional resource naming template.
    pub resource_template: Option<String>,
}

/// Partial update of a catalog entry. The code cannot be changed.
///
/// `Some("")` clears the optional `description` and `resource_template`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePermissionInput {
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement module.
    pub module: Option<String>,
    /// Replacement action.
    pub action: Option<String>,
    /// Replacement resource template.
    pub resource_template: Option<String>,
}

/// Validated catalog entry ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    /// Validated code.
    pub code: PermissionCode,
    /// Trimmed name.
    pub name: String,
    /// Trimmed description.
    pub description: Option<String>,
    /// Trimmed module.
    pub module: String,
    /// Trimmed action.
    pub action: String,
    /// Trimmed resource template.
    pub resource_template: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// Code matching mode for catalog queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeFilter {
    /// Code equals the value.
    Exact(String),
    /// Code starts with the value.
    Prefix(String),
}

impl CodeFilter {
    /// Returns whether the code satisfies the filter.
    #[must_use]
    pub fn matches(&self, code: &PermissionCode) -> bool {
        match self {
            Self::Exact(value) => code.as_str() == value,
            Self::Prefix(value) => code.has_prefix(value),
        }
    }
}

/// Query parameters for catalog listing. Results are ordered by code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionQuery {
    /// Optional module filter (exact).
    pub module: Option<String>,
    /// Optional action filter (exact).
    pub action: Option<String>,
    /// Optional code filter.
    pub code: Option<CodeFilter>,
    /// Whether deactivated entries are returned.
    pub include_inactive: bool,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for pagination.
    pub offset: usize,
}

impl Default for PermissionQuery {
    fn default() -> Self {
        Self {
            module: None,
            action: None,
            code: None,
            include_inactive: false,
            limit: 50,
            offset: 0,
        }
    }
}

impl PermissionQuery {
    /// Returns whether the permission satisfies every filter (pagination excluded).
    #[must_use]
    pub fn matches(&self, permission: &Permission) -> bool {
        (self.include_inactive || permission.is_active)
            && self
                .module
                .as_deref()
                .is_none_or(|module| permission.module == module)
            && self
                .action
                .as_deref()
                .is_none_or(|action| permission.action == action)
            && self
                .code
                .as_ref()
                .is_none_or(|filter| filter.matches(&permission.code))
    }
}

/// Repository port for the permission catalog.
#[async_trait]
pub trait PermissionCatalogRepository: Send + Sync {
    /// Inserts a new entry. Fails with `Conflict` when the code exists.
    async fn insert_permission(&self, permission: NewPermission) -> AppResult<Permission>;

    /// Replaces an existing entry by id. Fails with `NotFound` when absent.
    async fn save_permission(&self, permission: Permission) -> AppResult<()>;

    /// Finds an entry by id.
    async fn find_permission(&self, permission_id: PermissionId)
    -> AppResult<Option<Permission>>;

    /// Finds an entry by exact code.
    async fn find_permission_by_code(&self, code: &str) -> AppResult<Option<Permission>>;

    /// Finds every existing entry among the ids. Missing ids are skipped.
    async fn find_permissions(&self, permission_ids: &[PermissionId])
    -> AppResult<Vec<Permission>>;

    /// Lists entries matching the query, ordered by code.
    async fn query_permissions(&self, query: &PermissionQuery) -> AppResult<Vec<Permission>>;
}
