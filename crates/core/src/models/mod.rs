//! Records stored in the hosted tables.
//!
//! Field names match the table columns. Read types are lenient about `null`
//! columns since rows are edited by hand in the hosted dashboard; write types
//! (`*Input`, `New*`) serialize every column they own.

mod account;
mod order;
mod product;
mod review;
mod settings;

pub use account::{Account, AccountProfilePatch, AccountRolePatch};
pub use order::{NewOrder, Order, OrderItem, OrderStatusPatch};
pub use product::{Product, ProductInput, Selections, Variation, VariationOption};
pub use review::{NewReview, Review, ReviewStatusPatch};
pub use settings::{SiteSettings, SiteSettingsInput};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Deserialize a nullable column into `T::default()` when it is `null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept both `timestamptz` (RFC 3339) and bare `timestamp` columns.
pub(crate) fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// Short date for listings, e.g. `Mar 4, 2025`.
#[must_use]
pub fn format_date(date: Option<&DateTime<Utc>>) -> String {
    date.map_or_else(String::new, |d| d.format("%b %-d, %Y").to_string())
}
