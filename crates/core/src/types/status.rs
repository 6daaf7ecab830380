//! Status enums stored in free-form text columns.
//!
//! The hosted tables do not constrain these columns and the admin panels let
//! any status be set from any other, so these enums carry no transition
//! rules. Unknown strings are rejected at parse time rather than coerced.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidStatus {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored string value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(InvalidStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// Order lifecycle status.
    #[derive(Default)]
    OrderStatus, "order status" {
        #[default]
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Review moderation status. Only `Approved` reviews reach the storefront.
    #[derive(Default)]
    ReviewStatus, "review status" {
        #[default]
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// Billing interval for subscription products.
    SubscriptionInterval, "subscription interval" {
        Weekly => "weekly",
        Monthly => "monthly",
        Yearly => "yearly",
    }
}

impl SubscriptionInterval {
    /// Short suffix for price labels, e.g. `/mo`.
    #[must_use]
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Weekly => "/wk",
            Self::Monthly => "/mo",
            Self::Yearly => "/yr",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip_text() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_review_status_serde() {
        let json = serde_json::to_string(&ReviewStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        let parsed: ReviewStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(parsed, ReviewStatus::Rejected);
    }

    #[test]
    fn test_invalid_status_message() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid order status: shipped");
    }

    #[test]
    fn test_interval_suffix() {
        assert_eq!(SubscriptionInterval::Monthly.suffix(), "/mo");
        assert_eq!(
            "yearly".parse::<SubscriptionInterval>().unwrap(),
            SubscriptionInterval::Yearly
        );
    }
}
