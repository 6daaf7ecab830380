use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{flexible_timestamp, null_as_default};
use crate::types::{ProductId, ReviewId, ReviewStatus};

/// A row of the `Review` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_email: String,
    pub rating: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
}

impl Review {
    #[must_use]
    pub fn status(&self) -> Option<ReviewStatus> {
        self.status.parse().ok()
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status() == Some(ReviewStatus::Approved)
    }

    /// Rating clamped to 1-5 and rendered as filled/empty stars.
    #[must_use]
    pub fn stars(&self) -> String {
        let filled = usize::from(self.rating.clamp(1, 5));
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

/// Insert payload for a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub product_name: String,
    pub user_name: String,
    pub user_email: String,
    pub rating: u8,
    pub comment: String,
    pub status: ReviewStatus,
}

/// Patch payload for moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewStatusPatch {
    pub status: ReviewStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_and_stars() {
        let review: Review = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "product_id": "p1",
            "rating": 4,
            "status": "approved",
            "comment": null
        }))
        .unwrap();
        assert!(review.is_approved());
        assert_eq!(review.stars(), "★★★★☆");
        assert_eq!(review.comment, "");
    }
}
