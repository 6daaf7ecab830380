use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Selections, flexible_timestamp, null_as_default};
use crate::types::{OrderId, OrderStatus, Price, ProductId};

/// One purchased line, stored inside the order's `items` JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        rename = "selectedVariations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_variations: Option<Selections>,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// A row of the `Order` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub customer_email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<OrderItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: Price,
    /// Free-form; see [`Order::status`] for the typed view.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
}

impl Order {
    /// Typed status, `None` when the column holds something unrecognised.
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.parse().ok()
    }

    #[must_use]
    pub fn is(&self, status: OrderStatus) -> bool {
        self.status() == Some(status)
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Insert payload for a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderItem>,
    pub total: Price,
    pub status: OrderStatus,
}

/// Patch payload for the admin status selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderStatusPatch {
    pub status: OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wire_names() {
        let mut sel = Selections::new();
        sel.insert("Seats".into(), "25".into());
        let item = OrderItem {
            id: ProductId::new("p1"),
            name: "Dispatch Console".into(),
            price: Price::from_cents(1000),
            quantity: 2,
            image: None,
            selected_variations: Some(sel),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["selectedVariations"]["Seats"], "25");
        assert!(json.get("image").is_none());
        assert_eq!(item.line_total(), Price::from_cents(2000));
    }

    #[test]
    fn test_unknown_status_is_kept() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": 3,
            "customer_name": "Sam",
            "customer_email": "sam@resort.com",
            "items": null,
            "total": 0,
            "status": "refunded"
        }))
        .unwrap();
        assert_eq!(order.status, "refunded");
        assert_eq!(order.status(), None);
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_new_order_status_serializes_lowercase() {
        let new = NewOrder {
            customer_name: "Sam".into(),
            customer_email: "sam@resort.com".into(),
            items: vec![],
            total: Price::ZERO,
            status: OrderStatus::Pending,
        };
        let json = serde_json::to_value(&new).unwrap();
        assert_eq!(json["status"], "pending");
    }
}
