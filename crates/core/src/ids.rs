use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its storage value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying storage value.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse::<i64>().map(Self).map_err(|error| {
                    AppError::Validation(format!(
                        concat!("invalid ", $label, " '{}': {}"),
                        value, error
                    ))
                })
            }
        }
    };
}

numeric_id!(
    /// Identifier of an authenticated user, issued by the external identity provider.
    UserId,
    "user id"
);

numeric_id!(
    /// Identifier of a role owned by the external membership collaborator.
    RoleId,
    "role id"
);

numeric_id!(
    /// Identifier of a permission catalog entry.
    PermissionId,
    "permission id"
);
