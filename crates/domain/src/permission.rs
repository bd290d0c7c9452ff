//! Permission catalog entries and code validation.

use chrono::{DateTime, Utc};
use keygate_core::{AppError, AppResult, PermissionId};
use serde::{Deserialize, Serialize};

/// Maximum length of a permission code.
pub const PERMISSION_CODE_MAX_LENGTH: usize = 128;

/// Stable, globally unique permission code such as `EMPLOYEE.DELETE`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Creates a validated permission code.
    ///
    /// Codes are dot-separated segments of ASCII letters, digits, `_`, `-`
    /// and `:`. Comparison is case-sensitive.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "permission code must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > PERMISSION_CODE_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "permission code must not exceed {PERMISSION_CODE_MAX_LENGTH} characters"
            )));
        }

        if let Some(invalid) = trimmed
            .chars()
            .find(|character| !is_code_character(*character))
        {
            return Err(AppError::Validation(format!(
                "permission code '{trimmed}' contains invalid character '{invalid}'"
            )));
        }

        if trimmed.split('.').any(str::is_empty) {
            return Err(AppError::Validation(format!(
                "permission code '{trimmed}' must not contain empty segments"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the code string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether this code starts with the given prefix.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

fn is_code_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '.' | '_' | '-' | ':')
}

impl TryFrom<String> for PermissionCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionCode> for String {
    fn from(value: PermissionCode) -> Self {
        value.0
    }
}

impl std::fmt::Display for PermissionCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Catalog entry describing one atomic capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Stable catalog identifier.
    pub id: PermissionId,
    /// Globally unique code.
    pub code: PermissionCode,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Functional module the permission belongs to, e.g. `EMPLOYEE`.
    pub module: String,
    /// Action within the module, e.g. `DELETE`.
    pub action: String,
    /// Resource naming template; instance matching is left to callers.
    pub resource_template: Option<String>,
    /// Inactive permissions stay in the catalog but never resolve as granted.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Returns the resource template when one is configured and non-empty.
    #[must_use]
    pub fn effective_resource_template(&self) -> Option<&str> {
        self.resource_template
            .as_deref()
            .map(str::trim)
            .filter(|template| !template.is_empty())
    }
}
