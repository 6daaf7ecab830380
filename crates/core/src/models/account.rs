use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flexible_timestamp;
use crate::types::{Role, UserId};

/// A row of the optional `Account` side table, keyed by auth user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub updated_date: Option<DateTime<Utc>>,
}

impl Account {
    #[must_use]
    pub fn role(&self) -> Role {
        Role::from_stored(self.role.as_deref())
    }
}

/// Profile edit from the account page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountProfilePatch {
    pub full_name: String,
    pub email: String,
    pub updated_date: DateTime<Utc>,
}

/// Role column update issued alongside the role-change function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountRolePatch {
    pub role: Role,
}
