use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{flexible_timestamp, null_as_default};
use crate::types::{Price, ProductId, SubscriptionInterval};

/// Selected variation values, keyed by variation name.
pub type Selections = BTreeMap<String, String>;

/// One selectable value of a variation and its price delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationOption {
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_adjustment: Price,
}

/// A named variation (e.g. "License") with its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<VariationOption>,
}

impl Variation {
    #[must_use]
    pub fn option(&self, value: &str) -> Option<&VariationOption> {
        self.options.iter().find(|o| o.value == value)
    }
}

/// A row of the `Product` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: Price,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_subscription: bool,
    #[serde(default)]
    pub subscription_interval: Option<String>,
    #[serde(default)]
    pub stripe_price_id: Option<String>,
    #[serde(default)]
    pub stripe_recurring_price_id: Option<String>,
    #[serde(default)]
    pub template_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variations: Vec<Variation>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
}

impl Product {
    /// Unit price for the given selections: base price plus the adjustment of
    /// every selected option. Unknown names or values add nothing.
    #[must_use]
    pub fn price_with(&self, selections: &Selections) -> Price {
        let adjustments: Price = self
            .variations
            .iter()
            .filter_map(|v| {
                selections
                    .get(&v.name)
                    .and_then(|value| v.option(value))
                    .map(|o| o.price_adjustment)
            })
            .sum();
        self.price + adjustments
    }

    /// Keep only selections that name a real variation and option.
    #[must_use]
    pub fn valid_selections(&self, selections: &Selections) -> Selections {
        self.variations
            .iter()
            .filter_map(|v| {
                let value = selections.get(&v.name)?;
                v.option(value)?;
                Some((v.name.clone(), value.clone()))
            })
            .collect()
    }

    /// Parsed billing interval, only for subscription products.
    #[must_use]
    pub fn interval(&self) -> Option<SubscriptionInterval> {
        if !self.is_subscription {
            return None;
        }
        self.subscription_interval.as_deref()?.parse().ok()
    }

    /// Primary image followed by the gallery, without duplicates.
    #[must_use]
    pub fn gallery(&self) -> Vec<&str> {
        let mut all: Vec<&str> = Vec::with_capacity(self.images.len() + 1);
        for url in self.image.iter().chain(self.images.iter()) {
            if !url.is_empty() && !all.contains(&url.as_str()) {
                all.push(url);
            }
        }
        all
    }

    /// Price label including the interval suffix, e.g. `$9.99/mo`.
    #[must_use]
    pub fn price_label(&self) -> String {
        match self.interval() {
            Some(interval) => format!("{}{}", self.price, interval.suffix()),
            None => self.price.display(),
        }
    }
}

/// Writable columns of a product, used for both create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductInput {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub is_subscription: bool,
    pub subscription_interval: Option<String>,
    pub stripe_price_id: Option<String>,
    pub stripe_recurring_price_id: Option<String>,
    pub template_url: Option<String>,
    pub variations: Vec<Variation>,
}

impl From<&Product> for ProductInput {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            price: p.price,
            description: p.description.clone(),
            image: p.image.clone(),
            images: p.images.clone(),
            is_subscription: p.is_subscription,
            subscription_interval: p.subscription_interval.clone(),
            stripe_price_id: p.stripe_price_id.clone(),
            stripe_recurring_price_id: p.stripe_recurring_price_id.clone(),
            template_url: p.template_url.clone(),
            variations: p.variations.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn beacon() -> Product {
        serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Radio Beacon",
            "price": 100,
            "description": null,
            "image": "https://cdn/beacon.png",
            "images": ["https://cdn/beacon.png", "https://cdn/side.png"],
            "is_subscription": null,
            "variations": [
                {"name": "Band", "options": [
                    {"value": "VHF", "price_adjustment": 0},
                    {"value": "UHF", "price_adjustment": 15.5}
                ]},
                {"name": "Case", "options": [
                    {"value": "Hard", "price_adjustment": 20}
                ]}
            ],
            "created_date": "2024-11-02T09:30:00.123456+00:00"
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_tolerates_nulls() {
        let p = beacon();
        assert_eq!(p.id.as_str(), "7");
        assert_eq!(p.description, "");
        assert!(!p.is_subscription);
        assert!(p.created_date.is_some());
    }

    #[test]
    fn test_price_with_selections() {
        let p = beacon();
        let mut sel = Selections::new();
        sel.insert("Band".into(), "UHF".into());
        sel.insert("Case".into(), "Hard".into());
        assert_eq!(p.price_with(&sel), Price::from_cents(13550));
    }

    #[test]
    fn test_price_with_ignores_unknown_values() {
        let p = beacon();
        let mut sel = Selections::new();
        sel.insert("Band".into(), "Satellite".into());
        sel.insert("Color".into(), "Red".into());
        assert_eq!(p.price_with(&sel), Price::from_cents(10000));
        assert!(p.valid_selections(&sel).is_empty());
    }

    #[test]
    fn test_gallery_dedupes_primary_image() {
        assert_eq!(
            beacon().gallery(),
            vec!["https://cdn/beacon.png", "https://cdn/side.png"]
        );
    }

    #[test]
    fn test_interval_only_for_subscriptions() {
        let mut p = beacon();
        p.subscription_interval = Some("monthly".into());
        assert_eq!(p.interval(), None);
        p.is_subscription = true;
        assert_eq!(p.interval(), Some(SubscriptionInterval::Monthly));
        assert_eq!(p.price_label(), "$100.00/mo");
    }

    #[test]
    fn test_naive_timestamp_column() {
        let p: Product = serde_json::from_value(serde_json::json!({
            "id": "a", "name": "Kit", "price": 1, "created_date": "2024-01-05T10:00:00"
        }))
        .unwrap();
        assert!(p.created_date.is_some());
    }
}
