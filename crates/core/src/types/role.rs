//! Visitor roles and role resolution outcomes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Access role of a signed-in visitor.
///
/// Anything that is not literally `admin` is a regular user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Interpret a stored role string. Only the exact value `admin` grants
    /// admin; anything else, including case or whitespace variants, is `User`.
    #[must_use]
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("admin") => Self::Admin,
            _ => Self::User,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a submitted role is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct InvalidRole(String);

/// Strict parse for submitted values. Stored values go through
/// [`Role::from_stored`] instead.
impl core::str::FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Outcome of looking up a visitor's role in the account table.
///
/// Every outcome maps to a role. Lookups never fail the sign-in; they fall
/// back to `User`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLookup {
    /// A row exists; carries its `role` column.
    Row(Option<String>),
    /// The table exists but has no row for this visitor.
    NoRow,
    /// The table is known to be missing.
    TableMissing,
    /// The query failed for another reason.
    Failed,
}

impl RoleLookup {
    #[must_use]
    pub fn resolve(&self) -> Role {
        match self {
            Self::Row(role) => Role::from_stored(role.as_deref()),
            Self::NoRow | Self::TableMissing | Self::Failed => Role::User,
        }
    }
}
